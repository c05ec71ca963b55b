//! TryOn Server
//!
//! Wires configuration, logging and the shared [`AppState`] to the
//! transports:
//! - HTTP API (using `tryon-api`)
//! - Stdio job stream (using `tryon-native-messaging`)
//!
//! Business logic lives in `appstate` and below, not here.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CliArgs, Environment, LogFormat, ServerConfig, ServerMode};
pub use error::{ServerError, ServerResult};

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use appstate::{AppState, AppStateConfig, Backends};
use common::{AppStateProvider, StageFailure, TryOnError};
use tryon_model_cache::check_checkpoints;
use tryon_values::{Profile, Stage};

/// Interval between readiness progress logs.
const READY_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Request id under which startup failures are reported.
pub const STARTUP_REQUEST_ID: &str = "startup";

/// Runs the startup sequence and returns the shared state.
///
/// Creates the directory layout, clears leftovers from earlier runs,
/// reports missing checkpoints, detects accelerators, then starts model
/// construction in the background.
pub fn build_state(config: &ServerConfig, backends: Backends) -> anyhow::Result<AppState> {
    std::fs::create_dir_all(&config.paths.checkpoints_dir).with_context(|| {
        format!(
            "Failed to create checkpoints directory {}",
            config.paths.checkpoints_dir.display()
        )
    })?;
    let missing = check_checkpoints(&config.paths.checkpoints_dir);
    if !missing.is_empty() {
        tracing::warn!(
            missing = missing.len(),
            "Some checkpoints are missing; weight-backed models will fail to load"
        );
    }

    let accelerator_count = match tryon_hardware::detect_system() {
        Ok(system) => {
            tracing::info!(
                os = %system.os.name,
                cpus = system.cpu_count,
                ram_mb = system.memory.total_ram_mb,
                accelerators = system.accelerator_count,
                vram_mb = system.total_vram_mb,
                "Hardware detected"
            );
            for gpu in &system.gpus {
                tracing::info!(name = %gpu.name, vendor = ?gpu.vendor, vram_mb = ?gpu.vram_mb, "GPU");
            }
            system.accelerator_count
        }
        Err(e) => {
            tracing::warn!(error = %e, "Hardware detection failed, assuming CPU only");
            0
        }
    };

    let state_config = AppStateConfig {
        temp_dir: config.paths.temp_dir.clone(),
        output_dir: config.paths.output_dir.clone(),
        error_log: Some(config.paths.error_log.clone()),
        validation: config.processing.clone(),
        device: config.device_setting()?,
        precision: config.model.precision,
        workers: config.server.workers,
        environment: config.environment.as_str().to_string(),
        docs_path: config.docs_enabled().then(|| "/swagger-ui".to_string()),
    };
    let state = AppState::new(state_config, backends, accelerator_count)?;

    let cleared = state
        .store
        .clear_temp()
        .context("Failed to clear temporary files")?;
    if cleared > 0 {
        tracing::info!(files = cleared, "Removed leftover temporary files");
    }

    state.preload();
    Ok(state)
}

/// Blocks until every profile is built or `timeout` passes.
///
/// A failure is classified as a model-load error and recorded by the error
/// reporter like any request-time model failure.
pub async fn wait_until_ready(state: &AppState, timeout: Duration) -> anyhow::Result<()> {
    tracing::info!(timeout_secs = timeout.as_secs(), "Waiting for models to load");
    let started = Instant::now();
    let cache = Arc::clone(&state.cache);
    let waited = tokio::task::spawn_blocking(move || cache.wait_until_ready(&Profile::ALL, timeout, READY_POLL_INTERVAL))
        .await
        .context("Readiness wait was cancelled")?;

    if let Err(err) = waited {
        let failure = StageFailure::at(Stage::Loading, started.elapsed(), TryOnError::from(err));
        state.reporter.report(STARTUP_REQUEST_ID, &failure);
        return Err(failure.error).context("Models did not become ready");
    }
    tracing::info!("All models ready");
    Ok(())
}

/// Runs the transports selected by `config.mode` until they stop.
pub async fn serve(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let state: Arc<dyn AppStateProvider> = Arc::new(state);
    let native_config = tryon_native_messaging::NativeMessagingConfig::default();

    match config.mode {
        ServerMode::Http => {
            tryon_api::run_server_with_config(state, config.api_config()).await?;
        }
        ServerMode::Native => {
            tracing::info!("Running job stream on stdin/stdout");
            tryon_native_messaging::run_host_with_state(state, native_config).await?;
        }
        ServerMode::Both => {
            tracing::info!(port = config.server.port, "Running HTTP API and job stream");
            let http = tryon_api::run_server_with_config(Arc::clone(&state), config.api_config());
            let native = tryon_native_messaging::run_host_with_state(state, native_config);
            tokio::select! {
                result = http => result.context("HTTP server failed")?,
                result = native => {
                    result.context("Job stream failed")?;
                    tracing::info!("Job stream closed, shutting down");
                }
            }
        }
    }
    Ok(())
}
