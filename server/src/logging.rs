//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ServerError, ServerResult};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over the configured level. When `stdout_taken` is set
/// console output goes to stderr so it cannot corrupt the job stream.
pub fn init_logging(config: &LoggingConfig, stdout_taken: bool) -> ServerResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ServerError::Logging(format!("invalid log filter '{}': {}", config.level, e)))?;

    let layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ServerError::Logging(format!("{}: {}", parent.display(), e)))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ServerError::Logging(format!("{}: {}", path.display(), e)))?;
            fmt_layer(config.format, Mutex::new(file), false)
        }
        None if stdout_taken => fmt_layer(config.format, std::io::stderr, true),
        None => fmt_layer(config.format, std::io::stdout, true),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| ServerError::Logging(e.to_string()))
}

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .boxed(),
    }
}
