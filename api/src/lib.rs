//! HTTP API for the TryOn server.
//!
//! Thin transport over [`AppStateProvider`]: multipart uploads in, the
//! canonical success or failure body out. All validation and error
//! classification happens behind the provider.
//!
//! # Routes
//!
//! | Method | Path                  | Purpose                          |
//! |--------|-----------------------|----------------------------------|
//! | GET    | `/`                   | Service banner                   |
//! | GET    | `/health`             | Model readiness                  |
//! | POST   | `/process`, `/tryon`  | Run one try-on request           |
//! | GET    | `/results/{filename}` | Download a persisted result      |
//! | GET    | `/errors/summary`     | Error log aggregate              |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tryon_api::{run_server_with_config, ApiConfig};
//! # async fn example(state: Arc<dyn common::AppStateProvider>) -> anyhow::Result<()> {
//! run_server_with_config(state, ApiConfig::development()).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use common::AppStateProvider;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};

/// State shared by every handler.
pub type SharedState = Arc<dyn AppStateProvider>;

/// Router with state applied, ready to serve or to drive in tests.
pub fn build_router(state: SharedState, config: &ApiConfig) -> Router {
    router::configure_routes(config).with_state(state)
}

/// Serves the API until Ctrl-C.
pub async fn run_server_with_config(state: SharedState, config: ApiConfig) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;

    tracing::info!("TryOn API server listening on http://{}", addr);
    if config.enable_swagger {
        tracing::info!("Swagger UI:   http://{}/swagger-ui/", addr);
        tracing::info!("OpenAPI document: http://{}{}", addr, router::OPENAPI_PATH);
    }

    let app = build_router(state, &config);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
