//! Error taxonomy shared by every layer.
//!
//! Every failure a request can hit ends up as one of five kinds. Stage
//! code returns `anyhow::Result`; the orchestrator classifies anything it
//! does not recognise as a [`TryOnError::Processing`] at the stage where it
//! surfaced.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tryon_values::{ErrorKind, FieldError, Stage};

/// Classified failure.
#[derive(Debug, Error)]
pub enum TryOnError {
    /// One or more request fields were rejected.
    #[error("Validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    /// A profile's models could not be constructed.
    #[error("Failed to load model '{model}': {message}")]
    ModelLoad { model: String, message: String },

    /// A pipeline stage failed.
    #[error("Processing failed at stage {stage}: {source:#}")]
    Processing {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    /// A resource such as the filesystem or a worker slot was unavailable.
    #[error("Resource unavailable ({resource}): {message}")]
    Resource { resource: String, message: String },

    /// Anything that could not be classified.
    #[error("Unclassified error: {0:#}")]
    Unclassified(#[source] anyhow::Error),
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl TryOnError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::Validation(errors)
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn model_load(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            model: model.into(),
            message: message.into(),
        }
    }

    pub fn processing(stage: Stage, source: impl Into<anyhow::Error>) -> Self {
        Self::Processing {
            stage,
            source: source.into(),
        }
    }

    pub fn resource(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resource {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn unclassified(source: impl Into<anyhow::Error>) -> Self {
        Self::Unclassified(source.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::ModelLoad { .. } => ErrorKind::ModelLoad,
            Self::Processing { .. } => ErrorKind::Processing,
            Self::Resource { .. } => ErrorKind::Resource,
            Self::Unclassified(_) => ErrorKind::Unclassified,
        }
    }

    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    /// Classifies an opaque stage failure.
    ///
    /// A `TryOnError` already inside the chain keeps its kind; anything else
    /// becomes `Processing` at `stage`.
    pub fn classify(stage: Stage, error: anyhow::Error) -> Self {
        match error.downcast::<TryOnError>() {
            Ok(classified) => classified,
            Err(other) => Self::Processing {
                stage,
                source: other,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, TryOnError>;

/// A classified failure plus where and when it happened.
#[derive(Debug)]
pub struct StageFailure {
    pub error: TryOnError,
    pub stage: Option<Stage>,
    pub elapsed: Option<Duration>,
}

impl StageFailure {
    pub fn at(stage: Stage, elapsed: Duration, error: TryOnError) -> Self {
        Self {
            error,
            stage: Some(stage),
            elapsed: Some(elapsed),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl From<TryOnError> for StageFailure {
    fn from(error: TryOnError) -> Self {
        Self {
            error,
            stage: None,
            elapsed: None,
        }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "[{}] {}", stage, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for StageFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
