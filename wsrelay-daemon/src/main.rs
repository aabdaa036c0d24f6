//! wsrelay Daemon - WebSocket chat relay
//!
//! Serves a small chat page and relays every message received on the
//! WebSocket route to all connected clients.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use wsrelay_broadcaster::FanoutStrategy;
use wsrelay_daemon::{RelayConfig, RelayServer};

#[derive(Debug, Parser)]
#[command(name = "wsrelay-daemon", version, about = "WebSocket broadcast relay")]
struct Cli {
    /// Configuration file (default: <config dir>/wsrelay/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address, e.g. 127.0.0.1:3000
    #[arg(short, long)]
    bind: Option<String>,

    /// Override the fan-out strategy (concurrent or sequential)
    #[arg(long)]
    fanout: Option<FanoutStrategy>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    info!("Starting wsrelay daemon v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => RelayConfig::load_from(path),
        None => RelayConfig::load(),
    }
    .context("Failed to load configuration")?;

    info!("Configuration loaded from {}", config.config_path.display());

    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(fanout) = cli.fanout {
        config.fanout = fanout;
    }

    let server = RelayServer::bind(config.clone())
        .await
        .context("Failed to start relay server")?;
    let addr = server.local_addr()?;

    info!("Relay listening on {}", addr);
    info!("  - Chat page: http://{}{}", addr, config.page_path);
    info!("  - WebSocket: ws://{}{}", addr, config.ws_path);
    info!("  - Fan-out: {:?}", config.fanout);

    server.serve(shutdown_signal()).await?;

    info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
