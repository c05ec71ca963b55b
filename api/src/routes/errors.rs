//! Error log aggregate.

use axum::{extract::State, Json};
use tryon_values::ErrorSummary;

use crate::SharedState;

/// Aggregate of the unclassified-error log.
#[utoipa::path(
    get,
    path = "/errors/summary",
    responses(
        (status = 200, description = "Totals, per-kind counts and the most recent records", body = ErrorSummary),
    ),
    tag = "Service"
)]
pub async fn error_summary(State(state): State<SharedState>) -> Json<ErrorSummary> {
    Json(state.error_summary())
}
