//! Preorder execution agent - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Places stored limit orders once the market trades near them.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via PREORDER_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    preorder_ws::init_crypto();

    let args = Args::parse();

    preorder_telemetry::init_logging()?;

    info!("Starting preorder bot v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path: CLI arg > PREORDER_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("PREORDER_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = preorder_bot::AppConfig::from_file(&config_path)?;
    info!(
        ws_url = %config.feed.ws_url,
        store = %config.store.path,
        backend = ?config.broker.backend,
        "Configuration loaded"
    );

    let app = preorder_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
