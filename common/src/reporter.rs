//! Failure reporting.
//!
//! Decides what a caller sees and what only the operator sees. Validation
//! failures go out with every field issue. Model and processing failures go
//! out as kind plus stage while the full chain is logged. Unclassified
//! failures go out as a generic message. Every server-side failure is also
//! appended to a JSON-lines error log for later analysis.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use tryon_values::{ErrorKind, ErrorRecord, ErrorSummary, ProcessFailure};

use crate::errors::{StageFailure, TryOnError};

/// Records kept in [`ErrorSummary::recent_errors`].
pub const RECENT_ERRORS: usize = 10;

pub const GENERIC_MESSAGE: &str = "Internal server error";

pub struct ErrorReporter {
    log_path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl ErrorReporter {
    /// Reporter that appends records to `log_path`.
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: Some(log_path.into()),
            write_lock: Mutex::new(()),
        }
    }

    /// Reporter that only logs through `tracing`.
    pub fn without_log() -> Self {
        Self {
            log_path: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Logs `failure` and reduces it to the body a caller may see.
    pub fn report(&self, request_id: &str, failure: &StageFailure) -> ProcessFailure {
        let elapsed_ms = failure.elapsed.map(|d| d.as_millis() as u64).unwrap_or(0);
        let stage = failure.stage.map(|s| s.as_str()).unwrap_or("-");

        let body = match &failure.error {
            TryOnError::Validation(fields) => {
                tracing::info!(
                    request_id = %request_id,
                    fields = fields.len(),
                    "Request rejected: {}",
                    failure.error
                );
                ProcessFailure {
                    field_errors: Some(fields.clone()),
                    ..ProcessFailure::new(ErrorKind::Validation, failure.error.to_string())
                }
            }
            TryOnError::ModelLoad { model, .. } => {
                tracing::error!(
                    request_id = %request_id,
                    stage = %stage,
                    elapsed_ms,
                    error = ?failure.error,
                    "Model construction failed"
                );
                self.append(request_id, failure);
                ProcessFailure {
                    stage: failure.stage,
                    ..ProcessFailure::new(
                        ErrorKind::ModelLoad,
                        format!("Model '{}' is not available", model),
                    )
                }
            }
            TryOnError::Processing { stage: at, source } => {
                tracing::error!(
                    request_id = %request_id,
                    stage = %at,
                    elapsed_ms,
                    error = ?source,
                    "Pipeline stage failed"
                );
                self.append(request_id, failure);
                ProcessFailure {
                    stage: Some(*at),
                    ..ProcessFailure::new(
                        ErrorKind::Processing,
                        format!("Processing failed at stage {}", at),
                    )
                }
            }
            TryOnError::Resource { resource, message } => {
                tracing::warn!(
                    request_id = %request_id,
                    stage = %stage,
                    resource = %resource,
                    "Resource unavailable: {}",
                    message
                );
                ProcessFailure {
                    stage: failure.stage,
                    ..ProcessFailure::new(
                        ErrorKind::Resource,
                        format!("Resource unavailable: {}", resource),
                    )
                }
            }
            TryOnError::Unclassified(source) => {
                tracing::error!(
                    request_id = %request_id,
                    stage = %stage,
                    elapsed_ms,
                    error = ?source,
                    "Unclassified failure"
                );
                self.append(request_id, failure);
                ProcessFailure::new(ErrorKind::Unclassified, GENERIC_MESSAGE)
            }
        };

        body.with_request_id(request_id)
    }

    fn append(&self, request_id: &str, failure: &StageFailure) {
        let mut context = BTreeMap::new();
        context.insert("request_id".to_string(), request_id.to_string());
        if let Some(stage) = failure.stage {
            context.insert("stage".to_string(), stage.to_string());
        }
        if let Some(elapsed) = failure.elapsed {
            context.insert(
                "elapsed_ms".to_string(),
                elapsed.as_millis().to_string(),
            );
        }

        let trace = match &failure.error {
            TryOnError::Processing { source, .. } | TryOnError::Unclassified(source) => {
                format!("{:?}", source)
            }
            other => format!("{:?}", other),
        };

        let record = ErrorRecord {
            timestamp: Utc::now(),
            kind: failure.kind(),
            message: failure.error.to_string(),
            context,
            trace,
        };

        if let Err(e) = self.record(&record) {
            tracing::warn!(error = %e, "Failed to append error record");
        }
    }

    /// Appends one record as a JSON line.
    pub fn record(&self, record: &ErrorRecord) -> std::io::Result<()> {
        let Some(path) = &self.log_path else {
            return Ok(());
        };
        let line = serde_json::to_string(record)?;

        let _guard = self.write_lock.lock();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Aggregates the error log. Unreadable lines are skipped.
    pub fn summary(&self) -> ErrorSummary {
        let Some(path) = &self.log_path else {
            return ErrorSummary::default();
        };
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ErrorSummary::default(),
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "Failed to read error log");
                return ErrorSummary::default();
            }
        };

        let mut summary = ErrorSummary::default();
        let mut recent = std::collections::VecDeque::with_capacity(RECENT_ERRORS);
        for line in BufReader::new(file).lines().map_while(|l| l.ok()) {
            let Ok(record) = serde_json::from_str::<ErrorRecord>(&line) else {
                continue;
            };
            summary.total_errors += 1;
            *summary
                .error_types
                .entry(record.kind.as_str().to_string())
                .or_insert(0) += 1;
            if recent.len() == RECENT_ERRORS {
                recent.pop_front();
            }
            recent.push_back(record);
        }
        summary.recent_errors = recent.into_iter().collect();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::time::Duration;
    use tryon_values::{FieldError, Stage};

    fn reporter() -> (tempfile::TempDir, ErrorReporter) {
        let dir = tempfile::tempdir().unwrap();
        let reporter = ErrorReporter::new(dir.path().join("logs").join("errors.jsonl"));
        (dir, reporter)
    }

    #[test]
    fn test_validation_surfaces_every_field() {
        let (_dir, reporter) = reporter();
        let failure = StageFailure::from(TryOnError::validation(vec![
            FieldError::new("category", "unknown"),
            FieldError::new("steps", "too many"),
        ]));
        let body = reporter.report("req-1", &failure);
        assert_eq!(body.error_kind, ErrorKind::Validation);
        assert!(body.message.contains("category"));
        assert_eq!(body.field_errors.as_ref().map(|f| f.len()), Some(2));
        assert_eq!(reporter.summary().total_errors, 0);
    }

    #[test]
    fn test_processing_is_reduced_to_stage() {
        let (_dir, reporter) = reporter();
        let failure = StageFailure::at(
            Stage::Synthesizing,
            Duration::from_millis(42),
            TryOnError::processing(Stage::Synthesizing, anyhow!("CUDA out of memory at 0x7f")),
        );
        let body = reporter.report("req-2", &failure);
        assert_eq!(body.error_kind, ErrorKind::Processing);
        assert_eq!(body.message, "Processing failed at stage Synthesizing");
        assert_eq!(body.stage, Some(Stage::Synthesizing));
        assert!(!body.message.contains("CUDA"));
    }

    #[test]
    fn test_unclassified_is_generic_and_recorded() {
        let (_dir, reporter) = reporter();
        let failure = StageFailure::from(TryOnError::unclassified(anyhow!("worker panicked")));
        let body = reporter.report("req-3", &failure);
        assert_eq!(body.message, GENERIC_MESSAGE);
        assert_eq!(body.request_id.as_deref(), Some("req-3"));

        let summary = reporter.summary();
        assert_eq!(summary.total_errors, 1);
        assert_eq!(summary.error_types.get("UnclassifiedError"), Some(&1));
        let record = &summary.recent_errors[0];
        assert_eq!(record.context.get("request_id").map(String::as_str), Some("req-3"));
        assert!(record.trace.contains("worker panicked"));
    }

    #[test]
    fn test_summary_keeps_last_ten() {
        let (_dir, reporter) = reporter();
        for i in 0..15 {
            let failure = StageFailure::from(TryOnError::unclassified(anyhow!("failure {i}")));
            reporter.report(&format!("req-{i}"), &failure);
        }
        let summary = reporter.summary();
        assert_eq!(summary.total_errors, 15);
        assert_eq!(summary.recent_errors.len(), RECENT_ERRORS);
        assert!(summary.recent_errors[9].message.contains("failure 14"));
    }

    #[test]
    fn test_summary_without_log_file() {
        assert_eq!(ErrorReporter::without_log().summary(), ErrorSummary::default());
        let (_dir, reporter) = reporter();
        assert_eq!(reporter.summary().total_errors, 0);
    }
}
