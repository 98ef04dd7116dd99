//! Gateway bridge server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request      ┌──────────┐    ┌────────────────┐    ┌──────────┐
//!     ───────────────────▶│   http   │───▶│    session     │───▶│ pipeline │
//!                         │  server  │    │    ingress     │    │          │
//!                         └──────────┘    └────────────────┘    └────┬─────┘
//!                                                                    │
//!     Client Response     ┌──────────┐    ┌────────────────┐         │
//!     ◀───────────────────│  native  │◀───│    session     │◀────────┘
//!                         │  writer  │    │    egress      │
//!                         └──────────┘    └────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use gateway_bridge::config::{load_config, GatewayConfig};
use gateway_bridge::observability::init_logging;
use gateway_bridge::{EchoPipeline, GatewayServer};

#[derive(Parser)]
#[command(name = "gateway-bridge")]
#[command(about = "HTTP front end that echoes request bodies through the gateway session adapter", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    init_logging(&config.observability)?;

    tracing::info!("gateway-bridge v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        scheme = %config.listener.scheme,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    // Bind TCP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        address = %local_addr,
        "Listening for connections"
    );

    let server = GatewayServer::new(config, EchoPipeline);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
