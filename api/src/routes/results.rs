//! Serves persisted outputs.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use crate::error::{ApiError, ApiResult};
use crate::SharedState;

/// Download one persisted result by file name.
#[utoipa::path(
    get,
    path = "/results/{filename}",
    params(
        ("filename" = String, Path, description = "File name of a persisted result")
    ),
    responses(
        (status = 200, description = "PNG image", content_type = "image/png"),
        (status = 404, description = "No such result"),
    ),
    tag = "Try-on"
)]
pub async fn get_result(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let path = state
        .resolve_result(&filename)
        .ok_or_else(|| ApiError::NotFound(format!("Result '{}' not found", filename)))?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Result vanished before it could be served");
        ApiError::NotFound(format!("Result '{}' not found", filename))
    })?;

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}
