//! Central application state.
//!
//! Holds the shared pipeline resources and implements `AppStateProvider`
//! for every transport.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Semaphore;

use common::backend::{AppStateProvider, ProcessOutcome};
use common::{ErrorReporter, StageFailure, TryOnError};
use tryon_artifacts::{short_id, ArtifactStore};
use tryon_model_cache::{DevicePolicy, DeviceSetting, ModelCache, ModelFactory, Precision};
use tryon_pipeline::reference::{ReferenceModelFactory, ReferenceSegmenter};
use tryon_pipeline::{MaskCompositor, MaskSegmenter, PipelineOrchestrator};
use tryon_validation::{ValidationConfig, ValidationEngine};
use tryon_values::{
    ErrorSummary, HealthResponse, HealthStatus, ProcessRequest, ProcessSuccess, ServiceInfo,
    Uploads,
};

/// Length of the hex request id carried in responses and output names.
pub const REQUEST_ID_LEN: usize = 12;

/// Configuration for AppState initialization.
#[derive(Debug, Clone)]
pub struct AppStateConfig {
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Append-only error log. `None` disables persistence.
    pub error_log: Option<PathBuf>,
    pub validation: ValidationConfig,
    pub device: DeviceSetting,
    pub precision: Precision,
    /// Requests processed at once.
    pub workers: usize,
    pub environment: String,
    /// Where API docs are served, if anywhere.
    pub docs_path: Option<String>,
}

impl Default for AppStateConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp"),
            output_dir: PathBuf::from("outputs"),
            error_log: Some(PathBuf::from("logs/errors.jsonl")),
            validation: ValidationConfig::default(),
            device: DeviceSetting::Auto,
            precision: Precision::Float16,
            workers: 1,
            environment: "development".to_string(),
            docs_path: None,
        }
    }
}

/// Stage backends plugged into the pipeline.
#[derive(Clone)]
pub struct Backends {
    pub factory: Arc<dyn ModelFactory>,
    pub segmenter: Arc<dyn MaskSegmenter>,
}

impl Backends {
    /// Deterministic stand-ins that need no weights.
    pub fn reference() -> Self {
        Self {
            factory: Arc::new(ReferenceModelFactory),
            segmenter: Arc::new(ReferenceSegmenter),
        }
    }
}

/// Central application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub cache: Arc<ModelCache>,
    pub store: Arc<ArtifactStore>,
    pub reporter: Arc<ErrorReporter>,
    accelerator_count: u32,
    workers: Arc<Semaphore>,
    environment: String,
    docs_path: Option<String>,
}

impl AppState {
    /// Builds the state. Models are not constructed here; call
    /// [`AppState::preload`] or let the first request build them.
    pub fn new(config: AppStateConfig, backends: Backends, accelerator_count: u32) -> Result<Self> {
        tracing::info!("Initializing AppState...");

        config
            .validation
            .check()
            .map_err(|problems| anyhow::anyhow!("Invalid validation limits: {}", problems.join("; ")))?;
        anyhow::ensure!(config.workers >= 1, "workers must be at least 1");

        let store = ArtifactStore::new(config.temp_dir.clone(), config.output_dir.clone())
            .context("Failed to create artifact directories")?;

        let policy = DevicePolicy::new(config.device, accelerator_count, config.precision);
        let cache = Arc::new(ModelCache::new(backends.factory, policy));

        let reporter = match &config.error_log {
            Some(path) => ErrorReporter::new(path),
            None => ErrorReporter::without_log(),
        };

        let store = Arc::new(store);
        let orchestrator = PipelineOrchestrator::new(
            ValidationEngine::new(Arc::new(config.validation)),
            Arc::clone(&store),
            Arc::clone(&cache),
            MaskCompositor::new(backends.segmenter),
        );

        tracing::info!(
            workers = config.workers,
            accelerators = accelerator_count,
            environment = %config.environment,
            "AppState ready"
        );

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            cache,
            store,
            reporter: Arc::new(reporter),
            accelerator_count,
            workers: Arc::new(Semaphore::new(config.workers)),
            environment: config.environment,
            docs_path: config.docs_path,
        })
    }

    pub fn accelerator_count(&self) -> u32 {
        self.accelerator_count
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Starts background construction of every profile.
    ///
    /// Construction failures are logged by the cache and show up in health.
    pub fn preload(&self) {
        let started = self.cache.preload();
        tracing::info!(profiles = started.len(), "Model preload started");
    }
}

#[async_trait]
impl AppStateProvider for AppState {
    async fn process(&self, request: ProcessRequest, uploads: Uploads) -> ProcessOutcome {
        let request_id = short_id(REQUEST_ID_LEN);

        let permit = match Arc::clone(&self.workers).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                let failure = StageFailure::from(TryOnError::resource("worker pool", "closed"));
                return Err(self.reporter.report(&request_id, &failure));
            }
        };

        let orchestrator = Arc::clone(&self.orchestrator);
        let id = request_id.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            orchestrator.run(&id, &request, &uploads)
        })
        .await;

        let outcome = joined.unwrap_or_else(|err| {
            Err(StageFailure::from(TryOnError::unclassified(anyhow::anyhow!(
                "pipeline worker failed: {err}"
            ))))
        });

        match outcome {
            Ok(result) => Ok(ProcessSuccess::from(&result)),
            Err(failure) => Err(self.reporter.report(&request_id, &failure)),
        }
    }

    async fn health(&self) -> HealthResponse {
        let profiles = self.cache.status();
        let models_loaded = self.cache.all_ready();
        HealthResponse {
            status: if models_loaded {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            models_loaded,
            accelerator_available: self.accelerator_count > 0,
            accelerator_count: self.accelerator_count,
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: self.environment.clone(),
            profiles,
        }
    }

    fn resolve_result(&self, filename: &str) -> Option<PathBuf> {
        self.store.resolve_result(filename)
    }

    fn error_summary(&self) -> ErrorSummary {
        self.reporter.summary()
    }

    fn service_info(&self) -> ServiceInfo {
        ServiceInfo {
            name: "TryOn Server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            docs: self.docs_path.clone(),
            health: "/health".to_string(),
        }
    }
}
