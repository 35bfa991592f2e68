//! Global `tracing` subscriber setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{ConfigError, LoggingSettings};

/// Installs the global subscriber. `RUST_LOG` takes precedence over
/// `logging.filter`. Logs go to stderr so command output stays clean.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .map_err(|err| ConfigError::Logging(err.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if settings.json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()
    } else {
        registry.with(fmt::layer().with_target(false).with_writer(std::io::stderr)).try_init()
    };
    installed.map_err(|err| ConfigError::Logging(err.to_string()))
}
