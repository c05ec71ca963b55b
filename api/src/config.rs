//! API configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the HTTP API server.
///
/// # Example
///
/// ```rust
/// use tryon_api::ApiConfig;
///
/// let config = ApiConfig {
///     port: 9000,
///     cors_origins: vec!["http://localhost:3000".to_string()],
///     ..ApiConfig::default()
/// };
/// assert!(config.enable_cors);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Interface to bind.
    ///
    /// Default: `0.0.0.0`
    pub host: String,

    /// Port to bind the HTTP server to.
    ///
    /// Default: 7865
    pub port: u16,

    /// Enable Cross-Origin Resource Sharing (CORS).
    ///
    /// Default: true
    pub enable_cors: bool,

    /// Allowed origins for CORS requests.
    ///
    /// Use `["*"]` to allow all origins (development only).
    ///
    /// Default: `["*"]`
    pub cors_origins: Vec<String>,

    /// Request timeout in seconds.
    ///
    /// The pipeline is not interrupted when this fires; the client simply
    /// stops waiting for it.
    ///
    /// Default: 300 (5 minutes)
    pub timeout_secs: u64,

    /// Serve the OpenAPI document and Swagger UI at `/swagger-ui/`.
    ///
    /// Default: true
    pub enable_swagger: bool,

    /// Largest accepted request body. Must cover both uploads plus the
    /// multipart framing.
    ///
    /// Default: 21 MiB
    pub max_body_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7865,
            enable_cors: true,
            cors_origins: vec!["*".to_string()],
            timeout_secs: 300,
            enable_swagger: true,
            max_body_bytes: 21 * 1024 * 1024,
        }
    }
}

impl ApiConfig {
    /// Stricter defaults for production:
    /// - CORS restricted to the given origins
    /// - Swagger UI disabled
    pub fn production(allowed_origins: Vec<String>) -> Self {
        Self {
            enable_swagger: false,
            cors_origins: allowed_origins,
            ..Default::default()
        }
    }

    /// Permissive defaults for local development.
    pub fn development() -> Self {
        Self {
            cors_origins: vec!["*".to_string()],
            enable_swagger: true,
            ..Default::default()
        }
    }

    /// Body limit sized for two uploads of `max_file_size` bytes each.
    pub fn body_limit_for(max_file_size: usize) -> usize {
        max_file_size.saturating_mul(2).saturating_add(1024 * 1024)
    }
}
