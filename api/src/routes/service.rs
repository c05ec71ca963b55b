//! Service banner.

use axum::{extract::State, Json};
use tryon_values::ServiceInfo;

use crate::SharedState;

/// Service name, version and where to find docs and health.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service banner", body = ServiceInfo),
    ),
    tag = "Service"
)]
pub async fn service_info(State(state): State<SharedState>) -> Json<ServiceInfo> {
    Json(state.service_info())
}
