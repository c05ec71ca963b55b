//! Response types shared by every transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use utoipa::ToSchema;

use crate::request::{CanonicalRequest, FieldError};
use crate::types::{ErrorKind, Profile, Stage};

/// Wall-clock time spent in one stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub stage: Stage,
    pub seconds: f64,
}

/// Outcome of one successful pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub request_id: String,
    pub request: CanonicalRequest,
    /// Persisted outputs in synthesizer order.
    pub output_paths: Vec<PathBuf>,
    pub timings: Vec<StageTiming>,
    pub elapsed: Duration,
}

impl PipelineResult {
    pub fn result_paths(&self) -> Vec<String> {
        self.output_paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }
}

/// Body returned when a try-on request succeeds.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSuccess {
    pub success: bool,
    pub result_paths: Vec<String>,
    pub processing_time_seconds: f64,
    pub request_id: String,
    pub stage_timings: Vec<StageTiming>,
}

impl From<&PipelineResult> for ProcessSuccess {
    fn from(result: &PipelineResult) -> Self {
        Self {
            success: true,
            result_paths: result.result_paths(),
            processing_time_seconds: result.elapsed.as_secs_f64(),
            request_id: result.request_id.clone(),
            stage_timings: result.timings.clone(),
        }
    }
}

/// Body returned when a try-on request fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFailure {
    pub success: bool,
    pub error_kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<Vec<FieldError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ProcessFailure {
    pub fn new(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_kind,
            message: message.into(),
            field_errors: None,
            stage: None,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Construction state of one profile as reported to health probes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStatus {
    pub profile: Profile,
    /// `uninitialized`, `constructing`, `ready` or `failed`.
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub models_loaded: bool,
    pub accelerator_available: bool,
    pub accelerator_count: u32,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub environment: String,
    pub profiles: Vec<ProfileStatus>,
}

/// Persisted record of an unclassified failure. One JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    pub trace: String,
}

/// Aggregate view over the error log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    pub total_errors: usize,
    pub error_types: BTreeMap<String, usize>,
    pub recent_errors: Vec<ErrorRecord>,
}

/// Banner served at the service root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub docs: Option<String>,
    pub health: String,
}
