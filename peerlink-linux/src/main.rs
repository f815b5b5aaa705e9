// Peer link daemon: wpa_supplicant transport, supplicant monitor, operator console.

mod config;
mod console;
mod monitor;
mod provider;
mod service;
mod wpa;

use std::sync::Arc;

use anyhow::Context;
use peerlink_core::{ConnectionManager, EventDispatcher};
use tracing_subscriber::EnvFilter;

use crate::console::{DetailConsole, PeerListConsole};
use crate::provider::WpaCliProvider;
use crate::service::LinkService;
use crate::wpa::WpaCli;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("peerlink-linux {}", VERSION);
            return Ok(());
        }
    }

    let cfg = config::load().context("loading configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    rt.block_on(async {
        tracing::info!(interface = %cfg.interface, wpa_cli = %cfg.wpa_cli, "peerlink starting");
        let (sink, handle, inbox) = service::channel();
        let cli = Arc::new(WpaCli::new(&cfg.wpa_cli, &cfg.interface));
        let provider = WpaCliProvider::new(cli.clone(), sink.clone());
        let (notice_tx, notice_rx) = tokio::sync::mpsc::unbounded_channel();
        let dispatcher =
            EventDispatcher::new(ConnectionManager::new(), PeerListConsole, DetailConsole);

        let service = tokio::spawn(LinkService::new(dispatcher, provider, inbox, notice_tx).run());
        tokio::spawn(monitor::run_monitor(cli, sink, cfg.poll_interval()));

        tokio::select! {
            res = shutdown_signal() => res?,
            res = console::run_console(handle.clone(), notice_rx) => res.context("console input")?,
        }
        handle.shutdown().await;
        if let Err(e) = service.await {
            tracing::warn!(error = %e, "link service task ended abnormally");
        }
        Ok::<(), anyhow::Error>(())
    })
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("waiting for Ctrl+C")?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;
    }
    tracing::info!("shutdown requested");
    Ok(())
}
