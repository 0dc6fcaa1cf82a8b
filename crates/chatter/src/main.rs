//! # chatter
//!
//! Relay server binary. Wires config, logging, and metrics together and
//! runs the HTTP/WebSocket server until interrupted.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;

use chatter_server::config::ServerConfig;
use chatter_server::metrics;
use chatter_server::server::ChatterServer;

/// Chatter relay server.
#[derive(Parser, Debug)]
#[command(name = "chatter", about = "WebSocket chat relay server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Maximum concurrent connections (overrides the default if specified).
    #[arg(long)]
    max_connections: Option<usize>,

    /// Seconds between liveness pings (must be shorter than the timeout).
    #[arg(long)]
    heartbeat_interval: Option<u64>,

    /// Seconds without a pong before a peer is considered dead.
    #[arg(long)]
    heartbeat_timeout: Option<u64>,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            host: self.host,
            port: self.port,
            max_connections: self.max_connections.unwrap_or(defaults.max_connections),
            heartbeat_interval_secs: self
                .heartbeat_interval
                .unwrap_or(defaults.heartbeat_interval_secs),
            heartbeat_timeout_secs: self
                .heartbeat_timeout
                .unwrap_or(defaults.heartbeat_timeout_secs),
            ..defaults
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing();

    let metrics_handle = metrics::install_recorder();
    let config = args.into_config();
    anyhow::ensure!(
        config.heartbeat_interval_secs < config.heartbeat_timeout_secs,
        "heartbeat interval ({}s) must be shorter than the timeout ({}s)",
        config.heartbeat_interval_secs,
        config.heartbeat_timeout_secs,
    );

    let server = ChatterServer::new(config, metrics_handle);
    let (addr, handle) = server.listen().await.context("failed to bind relay server")?;
    tracing::info!("chatter relay listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    server.shutdown().graceful_shutdown(vec![handle], None).await;
    tracing::info!("shutdown complete");
    Ok(())
}
