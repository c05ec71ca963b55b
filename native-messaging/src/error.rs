//! Error types for the stdio job host.

use serde::{Deserialize, Serialize};
use tryon_values::{ErrorKind, ProcessFailure};

/// Result type for native messaging operations.
pub type NativeMessagingResult<T> = Result<T, NativeMessagingError>;

/// Error types for native messaging operations.
#[derive(Debug, thiserror::Error)]
pub enum NativeMessagingError {
    /// Malformed frame or message.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A payload field could not be used.
    #[error("Validation error in field '{field}': {message}")]
    Validation {
        /// Field that failed.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// Unknown route.
    #[error("Route not found: {route}")]
    RouteNotFound {
        /// Route as received.
        route: String,
    },

    /// stdin/stdout failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NativeMessagingError {
    /// Create a protocol error.
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a validation error.
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a route not found error.
    pub fn route_not_found<S: Into<String>>(route: S) -> Self {
        Self::RouteNotFound {
            route: route.into(),
        }
    }

    /// Get the error code for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Protocol(_) | Self::Json(_) => "PROTOCOL_ERROR",
            Self::Validation { .. } => ErrorKind::Validation.as_str(),
            Self::RouteNotFound { .. } => "ROUTE_NOT_FOUND",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

/// Error body sent back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling. Try-on failures use the error
    /// kind name, e.g. `ValidationError`.
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Field errors, failing stage and similar context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Request ID for tracing (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl From<NativeMessagingError> for ErrorResponse {
    fn from(err: NativeMessagingError) -> Self {
        let details = match &err {
            NativeMessagingError::Validation { field, message } => Some(serde_json::json!({
                "fieldErrors": [{ "field": field, "message": message }]
            })),
            _ => None,
        };
        Self {
            code: err.error_code().to_string(),
            message: err.to_string(),
            details,
            request_id: None,
        }
    }
}

impl From<ProcessFailure> for ErrorResponse {
    fn from(failure: ProcessFailure) -> Self {
        let mut details = serde_json::Map::new();
        if let Some(fields) = &failure.field_errors {
            details.insert("fieldErrors".into(), serde_json::json!(fields));
        }
        if let Some(stage) = failure.stage {
            details.insert("stage".into(), serde_json::json!(stage));
        }
        Self {
            code: failure.error_kind.as_str().to_string(),
            message: failure.message,
            details: (!details.is_empty()).then_some(serde_json::Value::Object(details)),
            request_id: failure.request_id,
        }
    }
}
