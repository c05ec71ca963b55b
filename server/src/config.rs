//! Configuration system for the TryOn server.
//!
//! Sources, highest priority first:
//! - CLI arguments
//! - `TRYON_*` environment variables (through clap's `env`)
//! - TOML config file (`tryon.toml` by default)
//! - Defaults
//!
//! Every section is optional in the file; missing keys keep their defaults.

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tryon_api::ApiConfig;
use tryon_model_cache::{DeviceSetting, Precision};
use tryon_validation::ValidationConfig;

use crate::error::{ServerError, ServerResult};

/// Command-line arguments for the TryOn server.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "tryon-server")]
#[command(about = "TryOn Server - virtual try-on over HTTP and a stdio job stream")]
#[command(version)]
pub struct CliArgs {
    /// Transports to run
    #[arg(long, short = 'm', value_enum, env = "TRYON_MODE")]
    pub mode: Option<ServerMode>,

    /// Configuration file path
    #[arg(long, short = 'c', default_value = "tryon.toml", env = "TRYON_CONFIG")]
    pub config: PathBuf,

    /// development, testing or production
    #[arg(long, value_enum, env = "TRYON_ENVIRONMENT")]
    pub environment: Option<Environment>,

    /// Interface for the HTTP API
    #[arg(long, env = "TRYON_HOST")]
    pub host: Option<String>,

    /// HTTP port for the API server
    #[arg(long, short = 'p', env = "TRYON_PORT")]
    pub port: Option<u16>,

    /// Requests processed at once
    #[arg(long, env = "TRYON_WORKERS")]
    pub workers: Option<usize>,

    /// `auto`, `cpu`, `cuda` or `cuda:N`
    #[arg(long, env = "TRYON_DEVICE")]
    pub device: Option<String>,

    /// Log level or full filter directive
    #[arg(long, env = "TRYON_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, env = "TRYON_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Block until every profile is built before serving
    #[arg(long, env = "TRYON_WAIT_READY")]
    pub wait_ready: bool,
}

/// Which transports to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    /// HTTP API only
    #[default]
    Http,
    /// Stdio job stream only
    Native,
    /// HTTP API and stdio job stream together
    Both,
}

impl ServerMode {
    pub fn runs_http(&self) -> bool {
        matches!(self, Self::Http | Self::Both)
    }

    /// Stdout carries job frames, so logs must go elsewhere.
    pub fn owns_stdout(&self) -> bool {
        matches!(self, Self::Native | Self::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Testing,
    #[default]
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Full server configuration (merged from all sources).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub mode: ServerMode,
    pub environment: Environment,
    pub model: ModelConfig,
    pub server: HttpConfig,
    pub processing: ValidationConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
    /// Set from the command line only.
    #[serde(skip)]
    pub wait_ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub device: String,
    pub precision: Precision,
    /// Seconds `--wait-ready` waits before giving up.
    pub ready_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            device: "auto".to_string(),
            precision: Precision::Float16,
            ready_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub timeout_secs: u64,
    pub cors_origins: Vec<String>,
    /// Serve Swagger UI. Unset means "only in development".
    pub enable_docs: Option<bool>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let api = ApiConfig::default();
        Self {
            host: api.host,
            port: api.port,
            workers: 1,
            timeout_secs: api.timeout_secs,
            cors_origins: api.cors_origins,
            enable_docs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is not set.
    pub level: String,
    pub format: LogFormat,
    /// Append to this file instead of the console.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub checkpoints_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    pub error_log: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            checkpoints_dir: PathBuf::from("checkpoints"),
            temp_dir: PathBuf::from("temp"),
            output_dir: PathBuf::from("outputs"),
            error_log: PathBuf::from("logs/errors.jsonl"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from CLI args and the optional config file, then
    /// validate it.
    ///
    /// Priority: CLI args > Environment > Config file > Defaults
    pub fn load(args: &CliArgs) -> ServerResult<Self> {
        let mut config = if args.config.exists() {
            Self::from_file(&args.config)?
        } else {
            Self::default()
        };

        if let Some(environment) = args.environment {
            config.environment = environment;
        }
        config.apply_environment();
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ServerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ServerError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Environment presets. Explicit CLI values still win.
    fn apply_environment(&mut self) {
        match self.environment {
            Environment::Testing => {
                self.model.device = "cpu".to_string();
                self.logging.level = "debug".to_string();
            }
            Environment::Development => {
                self.logging.level = "debug".to_string();
                self.server.enable_docs.get_or_insert(true);
            }
            Environment::Production => {}
        }
    }

    fn apply_args(&mut self, args: &CliArgs) {
        if let Some(mode) = args.mode {
            self.mode = mode;
        }
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(workers) = args.workers {
            self.server.workers = workers;
        }
        if let Some(device) = &args.device {
            self.model.device = device.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(format) = args.log_format {
            self.logging.format = format;
        }
        self.wait_ready = args.wait_ready;
    }

    /// Checks every section and reports all problems at once.
    pub fn validate(&self) -> ServerResult<()> {
        let mut problems = match self.processing.check() {
            Ok(()) => Vec::new(),
            Err(problems) => problems,
        };
        if self.server.workers == 0 {
            problems.push("server.workers must be at least 1".to_string());
        }
        if self.server.timeout_secs == 0 {
            problems.push("server.timeout_secs must be positive".to_string());
        }
        if let Err(e) = self.device_setting() {
            problems.push(format!("model.device: {}", e));
        }
        if self.logging.level.trim().is_empty() {
            problems.push("logging.level must not be empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ServerError::InvalidConfig(problems))
        }
    }

    pub fn device_setting(&self) -> tryon_model_cache::Result<DeviceSetting> {
        self.model.device.parse()
    }

    pub fn docs_enabled(&self) -> bool {
        self.server.enable_docs.unwrap_or(false)
    }

    /// Settings for the HTTP transport.
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            enable_cors: !self.server.cors_origins.is_empty(),
            cors_origins: self.server.cors_origins.clone(),
            timeout_secs: self.server.timeout_secs,
            enable_swagger: self.docs_enabled(),
            max_body_bytes: ApiConfig::body_limit_for(self.processing.max_file_size),
        }
    }
}
