use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tracing::{debug, info, warn};

use homectl_common::{
    packet::{self, VALUE_MASK, XBEE_INBOUND_MAGIC, XBEE_OUTBOUND_MAGIC},
    SensedValues, WirePacket,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Reply(WirePacket),
    Relayed(WirePacket),
}

/// Splits the controller's byte stream into frames. A relayed command whose
/// first byte happens to be `0xD4` is indistinguishable from a reply header.
#[derive(Debug, Default)]
struct FrameReader {
    pending: Vec<u8>,
    reply: bool,
}

impl FrameReader {
    fn push(&mut self, byte: u8) -> Option<Frame> {
        if self.pending.is_empty() && !self.reply && byte == XBEE_OUTBOUND_MAGIC {
            self.reply = true;
            return None;
        }

        self.pending.push(byte);
        let [bools, temperature, humidity] = self.pending[..] else {
            return None;
        };
        self.pending.clear();

        let packet = WirePacket::from_bytes([bools, temperature, humidity]);
        if std::mem::take(&mut self.reply) {
            Some(Frame::Reply(packet))
        } else {
            Some(Frame::Relayed(packet))
        }
    }
}

fn simulated_reading(tick: u64) -> SensedValues {
    // Hardware integration point: DS18B20 and DHT11 drivers replace this.
    SensedValues {
        temperature: 68 + (tick % 8) as u8,
        humidity: 42 + (tick % 6) as u8,
    }
}

fn sensor_report(values: SensedValues) -> [u8; 3] {
    [
        XBEE_INBOUND_MAGIC,
        values.temperature & VALUE_MASK,
        values.humidity & VALUE_MASK,
    ]
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if std::env::var("HOMECTL_SENSOR_MODE").is_ok_and(|mode| mode == "relay") {
        return crate::relay::run(addr_from_env("HOMECTL_AUX_ADDR", "127.0.0.1:7003")?).await;
    }

    let addr = addr_from_env("HOMECTL_XBEE_ADDR", "127.0.0.1:7002")?;
    let interval_secs = std::env::var("HOMECTL_SENSOR_INTERVAL_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(5)
        .max(1);

    info!(%addr, interval_secs, "sensor simulator started");

    let mut tick: u64 = 0;
    loop {
        if let Err(err) = session(addr, Duration::from_secs(interval_secs), &mut tick).await {
            warn!("sensor link error: {err:#}");
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
}

pub fn addr_from_env(name: &str, default: &str) -> anyhow::Result<SocketAddr> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{name} is not a socket address"))
}

async fn session(addr: SocketAddr, period: Duration, tick: &mut u64) -> anyhow::Result<()> {
    let socket = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to xbee bridge at {addr}"))?;
    info!(%addr, "connected to controller");

    let (mut reader, mut writer) = socket.into_split();
    let mut frames = FrameReader::default();
    let mut interval = tokio::time::interval(period);
    let mut buf = [0u8; 64];

    loop {
        tokio::select! {
            _ = interval.tick() => {
                *tick = tick.saturating_add(1);
                let reading = simulated_reading(*tick);
                writer
                    .write_all(&sensor_report(reading))
                    .await
                    .context("failed to send sensor report")?;
                debug!(?reading, "sent sensor report");
            }
            read = reader.read(&mut buf) => {
                let n = read.context("failed to read from controller")?;
                if n == 0 {
                    anyhow::bail!("controller closed the connection");
                }
                for frame in buf[..n].iter().filter_map(|byte| frames.push(*byte)) {
                    log_frame(frame);
                }
            }
        }
    }
}

fn log_frame(frame: Frame) {
    match frame {
        Frame::Reply(packet) => {
            let fields = packet::from_wire(packet);
            info!(
                temperature_mode = fields.temperature_mode().as_str(),
                light_mode = fields.light_mode().as_str(),
                setpoint = fields.temperature,
                humidity = fields.humidity,
                humidifier = fields.humidifier_enabled,
                "controller state"
            );
        }
        Frame::Relayed(packet) => {
            info!(bytes = ?packet.to_bytes(), "relayed remote command");
        }
    }
}
