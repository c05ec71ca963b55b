//! Router configuration.

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ApiConfig;
use crate::{middleware, routes, SharedState};

/// Path of the generated OpenAPI document.
pub const OPENAPI_PATH: &str = "/api-doc/openapi.json";

/// Builds every route and middleware layer. State is applied by the caller.
pub fn configure_routes(config: &ApiConfig) -> Router<SharedState> {
    let mut router = Router::new()
        .route("/", get(routes::service::service_info))
        .route("/health", get(routes::health::health))
        .route("/process", post(routes::process::process))
        // Alias kept for older clients.
        .route("/tryon", post(routes::process::process))
        .route("/results/{filename}", get(routes::results::get_result))
        .route("/errors/summary", get(routes::errors::error_summary));

    if config.enable_swagger {
        router = router
            .merge(SwaggerUi::new("/swagger-ui").url(OPENAPI_PATH, routes::ApiDoc::openapi()));
    }

    // Layers added last wrap the ones before them.
    router
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeout_secs)))
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::cors_layer(config))
}
