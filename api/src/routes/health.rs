//! Health check endpoint.

use axum::{extract::State, Json};
use tryon_values::HealthResponse;

use crate::SharedState;

/// Model readiness and accelerator summary.
///
/// Always answers 200; readiness is carried in `status`.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health report", body = HealthResponse),
    ),
    tag = "Service"
)]
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(state.health().await)
}
