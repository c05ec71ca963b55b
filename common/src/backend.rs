//! Backend trait shared by every transport.
//!
//! ```text
//! ┌──────────┐      ┌───────────────┐
//! │   API    │      │  Job stdio    │
//! │ (HTTP)   │      │ (length+JSON) │
//! └────┬─────┘      └───────┬───────┘
//!      │                    │
//!      └─────────┬──────────┘
//!                ▼
//!    ┌───────────────────────┐
//!    │  AppStateProvider     │
//!    │  process() / health() │
//!    └───────────┬───────────┘
//!                ▼
//!    ┌───────────────────────┐
//!    │  PipelineOrchestrator │
//!    └───────────────────────┘
//! ```
//!
//! Transports only translate their wire format into [`ProcessRequest`] plus
//! [`Uploads`] and the outcome back out. Validation, error classification
//! and reporting happen behind the trait, so every transport answers the
//! same request the same way.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tryon_values::{
    ErrorSummary, HealthResponse, ProcessFailure, ProcessRequest, ProcessSuccess, ServiceInfo,
    Uploads,
};

/// Result of one try-on request after reporting.
pub type ProcessOutcome = Result<ProcessSuccess, ProcessFailure>;

#[async_trait]
pub trait AppStateProvider: Send + Sync + 'static {
    /// Runs one try-on request end to end.
    async fn process(&self, request: ProcessRequest, uploads: Uploads) -> ProcessOutcome;

    async fn health(&self) -> HealthResponse;

    /// Path of a persisted output, if `filename` names one.
    fn resolve_result(&self, filename: &str) -> Option<PathBuf>;

    fn error_summary(&self) -> ErrorSummary;

    fn service_info(&self) -> ServiceInfo;
}

#[async_trait]
impl AppStateProvider for Arc<dyn AppStateProvider> {
    async fn process(&self, request: ProcessRequest, uploads: Uploads) -> ProcessOutcome {
        (**self).process(request, uploads).await
    }

    async fn health(&self) -> HealthResponse {
        (**self).health().await
    }

    fn resolve_result(&self, filename: &str) -> Option<PathBuf> {
        (**self).resolve_result(filename)
    }

    fn error_summary(&self) -> ErrorSummary {
        (**self).error_summary()
    }

    fn service_info(&self) -> ServiceInfo {
        (**self).service_info()
    }
}
