//! Edge gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                   EDGE GATEWAY                    │
//!   http://  ─────────────┼─▶ :80  redirect ──▶ 301 https://<canonical>/...  │
//!                         │                                                   │
//!   https:// ─────────────┼─▶ :443 TLS (h2 | http/1.1)                        │
//!                         │      │                                            │
//!                         │      ▼                                            │
//!                         │   security headers · request id · body limit      │
//!                         │      │                                            │
//!                         │      ▼                                            │
//!                         │   route table (longest prefix)                    │
//!                         │      ├──▶ static root (read-only) ───────────────┼──▶ disk
//!                         │      ├──▶ upgrade tunnel (WebSocket) ────────────┼──▶ backend
//!                         │      └──▶ reverse proxy (streamed) ──────────────┼──▶ backend
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use edge_gateway::config::{load_config, GatewayConfig};
use edge_gateway::lifecycle::{bootstrap, prepare, shutdown_on_signal, Shutdown};
use edge_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "TLS-terminating edge gateway", long_about = None)]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate configuration and TLS material, then exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "edge-gateway starting"
    );

    if cli.check {
        prepare(config)?;
        tracing::info!("Configuration OK");
        return Ok(());
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let gateway = bootstrap(config, shutdown.clone()).await?;
    tokio::spawn(shutdown_on_signal(shutdown));

    gateway.run().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
