use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Context;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::mpsc,
};
use tracing::{info, warn};

use homectl_common::{store, Controller, Peer, Peripherals, RuntimeConfig};

use crate::drivers::{
    read_keys, Bridge, ButtonQueue, FileStore, KeyButtons, LogDisplay, SystemClock, TcpMux,
};

struct DataDir {
    config_path: PathBuf,
    image_path: PathBuf,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data = DataDir::new();
    let mut config = data.load_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config: {err:#}");
        RuntimeConfig::default()
    });
    config.sanitize();

    let image = data.load_image().await.unwrap_or_else(|err| {
        warn!("failed to load store image, starting erased: {err:#}");
        store::erased_image()
    });

    let (imp, imp_outbound) = Bridge::new();
    let (xbee, xbee_outbound) = Bridge::new();
    spawn_bridge(Peer::Imp, port_from_env("HOMECTL_IMP_PORT", 7001), imp.clone(), imp_outbound).await?;
    spawn_bridge(
        Peer::Xbee,
        port_from_env("HOMECTL_XBEE_PORT", 7002),
        xbee.clone(),
        xbee_outbound,
    )
    .await?;

    let buttons = ButtonQueue::default();
    spawn_key_reader(buttons.clone())?;

    let running = Arc::new(AtomicBool::new(true));
    let keep_running = running.clone();
    let io = Peripherals {
        store: FileStore::new(data.image_path.clone(), image),
        mux: TcpMux::new(imp, xbee),
        buttons: KeyButtons::new(buttons),
        display: LogDisplay::default(),
        clock: SystemClock::new(),
    };
    let poll_loop = tokio::task::spawn_blocking(move || {
        let mut controller = Controller::new(config, io);
        info!("controller poll loop started");
        controller.run_while(|| keep_running.load(Ordering::Relaxed));
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    running.store(false, Ordering::Relaxed);
    poll_loop.await.context("controller poll loop panicked")?;
    Ok(())
}

fn port_from_env(name: &str, default: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(default)
}

async fn spawn_bridge(
    peer: Peer,
    port: u16,
    bridge: Arc<Bridge>,
    outbound: mpsc::UnboundedReceiver<u8>,
) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {} bridge at {addr}", peer.as_str()))?;
    info!("{} bridge listening on {addr}", peer.as_str());

    tokio::spawn(serve_bridge(peer, listener, bridge, outbound));
    Ok(())
}

async fn serve_bridge(
    peer: Peer,
    listener: TcpListener,
    bridge: Arc<Bridge>,
    mut outbound: mpsc::UnboundedReceiver<u8>,
) {
    let peer = peer.as_str();
    loop {
        let (socket, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!("{peer} bridge accept error: {err}");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };
        info!(%remote, "{peer} connected");

        while outbound.try_recv().is_ok() {}
        bridge.set_connected(true);

        let (mut reader, mut writer) = socket.into_split();
        let mut buf = [0u8; 64];
        loop {
            tokio::select! {
                read = reader.read(&mut buf) => match read {
                    Ok(0) => break,
                    Ok(n) => bridge.push_inbound(&buf[..n]),
                    Err(err) => {
                        warn!("{peer} read error: {err}");
                        break;
                    }
                },
                byte = outbound.recv() => {
                    let Some(byte) = byte else {
                        bridge.set_connected(false);
                        return;
                    };
                    if let Err(err) = writer.write_all(&[byte]).await {
                        warn!("{peer} write error: {err}");
                        break;
                    }
                }
            }
        }

        bridge.set_connected(false);
        info!(%remote, "{peer} disconnected");
    }
}

// Blocking stdin reads live on a thread that shutdown does not join.
fn spawn_key_reader(queue: ButtonQueue) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("key-reader".to_string())
        .spawn(move || read_keys(std::io::stdin().lock(), &queue))
        .context("failed to spawn key reader")?;
    Ok(())
}

impl DataDir {
    fn new() -> Self {
        let data_dir = std::env::var("HOMECTL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.homectl"));

        Self {
            config_path: data_dir.join("config.json"),
            image_path: data_dir.join("eeprom.json"),
        }
    }

    async fn load_config(&self) -> anyhow::Result<RuntimeConfig> {
        match tokio::fs::read(&self.config_path).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn load_image(&self) -> anyhow::Result<Vec<u8>> {
        match tokio::fs::read_to_string(&self.image_path).await {
            Ok(raw) => Ok(store::parse_image(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.image_path.display(), "no store image yet");
                Ok(store::erased_image())
            }
            Err(err) => Err(err.into()),
        }
    }
}
