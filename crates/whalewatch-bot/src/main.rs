//! Whale transfer monitor - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Whale transfer monitor for ledger transaction feeds
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via WHALEWATCH_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    whalewatch_stream::init_crypto();

    let args = Args::parse();

    whalewatch_telemetry::init_logging()?;

    info!("Starting whalewatch v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > WHALEWATCH_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("WHALEWATCH_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = whalewatch_bot::AppConfig::from_file(&config_path)?;
    info!(streams = config.streams.len(), "Configuration loaded");

    let app = whalewatch_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
