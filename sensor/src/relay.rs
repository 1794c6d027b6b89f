use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tracing::{info, warn};

use homectl_common::relay::AuxRelay;

#[derive(Debug, Default)]
struct RelayLink {
    relay: AuxRelay,
    first: Option<u8>,
}

impl RelayLink {
    fn feed(&mut self, bytes: &[u8]) -> Vec<u8> {
        let mut replies = Vec::new();
        for &byte in bytes {
            let Some(flags) = self.first.take() else {
                self.first = Some(byte);
                continue;
            };

            let lights = self.relay.lights_output();
            if let Some(reply) = self.relay.exchange([flags, byte]) {
                replies.extend_from_slice(&reply);
            }
            if self.relay.lights_output() != lights {
                info!(on = self.relay.lights_output(), "lighting relay switched");
            }
        }
        replies
    }
}

pub async fn run(addr: SocketAddr) -> anyhow::Result<()> {
    info!(%addr, "aux relay simulator started");

    let mut link = RelayLink::default();
    loop {
        if let Err(err) = session(addr, &mut link).await {
            warn!("aux relay link error: {err:#}");
        }
        link.first = None;
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
}

async fn session(addr: SocketAddr, link: &mut RelayLink) -> anyhow::Result<()> {
    let mut socket = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to cloud bridge at {addr}"))?;
    info!(%addr, "connected to cloud bridge");

    let mut buf = [0u8; 64];
    loop {
        let n = socket
            .read(&mut buf)
            .await
            .context("failed to read from cloud bridge")?;
        if n == 0 {
            anyhow::bail!("cloud bridge closed the connection");
        }

        let replies = link.feed(&buf[..n]);
        if !replies.is_empty() {
            socket
                .write_all(&replies)
                .await
                .context("failed to answer status query")?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homectl_common::relay::{COOLER, ORIGIN_REMOTE, STATUS_QUERY};

    #[test]
    fn answers_queries_split_across_reads() {
        let mut link = RelayLink::default();

        assert!(link.feed(&[ORIGIN_REMOTE]).is_empty());
        assert_eq!(link.feed(&[STATUS_QUERY]), vec![0x41, 72]);
    }

    #[test]
    fn command_then_query_reports_new_state() {
        let mut link = RelayLink::default();

        let replies = link.feed(&[ORIGIN_REMOTE | COOLER, 68, ORIGIN_REMOTE, STATUS_QUERY]);

        assert_eq!(replies, vec![ORIGIN_REMOTE | COOLER, 68]);
        assert!(!link.relay.lights_output());
    }
}
