//! polyterm gateway - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Real-time wallet activity streaming gateway
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via POLYTERM_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any upstream TLS connection.
    polyterm_ws::init_crypto();

    let args = Args::parse();

    polyterm_telemetry::init_logging()?;

    info!("Starting polyterm gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = polyterm_server::AppConfig::load(args.config)?;
    info!(
        port = config.server.port,
        heartbeat_interval_ms = config.server.heartbeat_interval_ms,
        upstream = %config.upstream.url,
        "Configuration loaded"
    );

    let app = polyterm_server::Application::new(config)?;
    app.run().await?;

    Ok(())
}
