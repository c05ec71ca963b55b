//! Error types for the API.
//!
//! Try-on failures keep the canonical failure body shared with every other
//! transport. Missing results answer with RFC 7807 Problem Details.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tryon_values::ProcessFailure;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A try-on request failed. Status follows the error kind.
    #[error("{}: {}", .0.error_kind, .0.message)]
    Process(ProcessFailure),

    /// Not found (404) - resource doesn't exist
    #[error("Not Found: {0}")]
    NotFound(String),
}

impl From<ProcessFailure> for ApiError {
    fn from(failure: ProcessFailure) -> Self {
        Self::Process(failure)
    }
}

/// RFC 7807 Problem Details response.
#[derive(Debug, Serialize, Deserialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    type_uri: String,
    title: String,
    status: u16,
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, title, detail) = match self {
            Self::Process(failure) => {
                let status = StatusCode::from_u16(failure.error_kind.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                return (status, Json(failure)).into_response();
            }
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "Not Found", msg),
        };

        let problem = ProblemDetails {
            type_uri: format!("about:blank#{}", title.to_lowercase().replace(' ', "-")),
            title: title.to_string(),
            status: status.as_u16(),
            detail,
        };

        (status, Json(problem)).into_response()
    }
}
