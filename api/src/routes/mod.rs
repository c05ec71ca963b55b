//! API route handlers.

pub mod errors;
pub mod health;
pub mod process;
pub mod results;
pub mod service;

use utoipa::OpenApi;

/// OpenAPI documentation for all routes.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "TryOn API",
        description = "Virtual try-on: submit a person photo and a garment photo, get rendered results back",
        license(name = "MIT")
    ),
    paths(
        service::service_info,
        health::health,
        process::process,
        results::get_result,
        errors::error_summary,
    ),
    components(schemas(
        process::ProcessForm,
        tryon_values::ProcessSuccess,
        tryon_values::ProcessFailure,
        tryon_values::FieldError,
        tryon_values::StageTiming,
        tryon_values::Stage,
        tryon_values::ErrorKind,
        tryon_values::HealthResponse,
        tryon_values::HealthStatus,
        tryon_values::ProfileStatus,
        tryon_values::Profile,
        tryon_values::ErrorSummary,
        tryon_values::ErrorRecord,
        tryon_values::ServiceInfo,
    )),
    tags(
        (name = "Try-on", description = "Try-on submission and results"),
        (name = "Service", description = "Health and diagnostics"),
    )
)]
pub struct ApiDoc;
