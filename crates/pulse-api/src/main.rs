//! # pulse-api
//!
//! Pulse gateway server binary — HTTP API plus the WebSocket event
//! gateway.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pulse_server::config::ServerConfig;
use pulse_server::server::PulseServer;

/// Pulse gateway server.
#[derive(Parser, Debug)]
#[command(name = "pulse-api", about = "Pulse gateway server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(args.json_logs);

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        ..ServerConfig::default()
    }
    .with_env_overrides();

    let server = PulseServer::new(config);
    let (addr, handle) = server.listen().await.context("failed to bind server")?;
    tracing::info!("pulse gateway listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down...");
    server.shutdown().shutdown();
    let _ = handle.await;
    tracing::info!("shutdown complete");
    Ok(())
}
