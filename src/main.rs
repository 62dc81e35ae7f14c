//! Edge Tunnel
//!
//! WebSocket edge for a VLESS-style tunnel protocol.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                     EDGE TUNNEL                       │
//!                     │                                                       │
//!   WebSocket upgrade │  ┌─────────┐   ┌──────────┐   ┌──────────────────┐    │
//!   ──────────────────┼─▶│  http   │──▶│  tunnel  │──▶│ relay / connector│────┼──▶ Destination
//!                     │  │ server  │   │ session  │   └────────┬─────────┘    │
//!                     │  └─────────┘   └────┬─────┘            │ fallback     │
//!                     │                     │ udp/53           ▼              │
//!                     │                     │          ┌──────────────┐       │
//!                     │                     └─────────▶│  doh client  │───────┼──▶ DoH resolver
//!                     │                                └──────────────┘       │
//!                     │  ┌────────────────────────────────────────────────┐   │
//!                     │  │ config · observability · net · lifecycle       │   │
//!                     │  └────────────────────────────────────────────────┘   │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_tunnel::config::{load_config, ProxyConfig};
use edge_tunnel::lifecycle::{signals, Shutdown};
use edge_tunnel::observability::{logging, metrics};
use edge_tunnel::HttpServer;

#[derive(Parser)]
#[command(name = "edge-tunnel")]
#[command(about = "WebSocket tunnel edge with NAT64 fallback", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability.log_level);
    tracing::info!("edge-tunnel v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        nat64_prefix = %config.tunnel.nat64_prefix,
        doh = %config.doh.url,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
