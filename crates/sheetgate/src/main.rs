//! SheetGate gateway binary.
//!
//! Usage:
//!     sheetgate --bind 0.0.0.0:8000 --remote-url http://localhost:5000

use anyhow::Context;
use clap::Parser;
use sheetgate::{GatewayArgs, GatewayConfig};
use sheetgate_logging::{init_logging, LogConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let args = GatewayArgs::parse();
    let config = GatewayConfig::from_args(&args).context("Invalid configuration")?;

    init_logging(LogConfig {
        app_name: "sheetgate",
        verbose: args.verbose,
        log_dir: config.log_dir.clone(),
    })?;

    tracing::info!("Starting SheetGate");
    tracing::info!("  Bind: {}", config.bind_addr);
    tracing::info!("  Processing service: {}", config.remote_base_url);
    tracing::info!("  Staging directory: {}", config.staging_dir.display());

    sheetgate::serve(&config).await
}
