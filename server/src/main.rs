//! TryOn server binary.

use std::time::Duration;

use anyhow::Result;
use appstate::Backends;
use clap::Parser;
use tryon_server::{build_state, logging, serve, wait_until_ready, CliArgs, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = ServerConfig::load(&args)?;
    logging::init_logging(&config.logging, config.mode.owns_stdout())?;

    tracing::info!("Starting TryOn Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        mode = ?config.mode,
        environment = config.environment.as_str(),
        device = %config.model.device,
        workers = config.server.workers,
        "Configuration loaded"
    );
    tracing::info!("Using reference stage backend");

    let state = build_state(&config, Backends::reference())?;

    if config.wait_ready {
        wait_until_ready(&state, Duration::from_secs(config.model.ready_timeout_secs)).await?;
    }

    serve(&config, state).await
}
