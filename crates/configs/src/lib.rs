//! corkboard/crates/configs/src/lib.rs
//!
//! Layered settings for the Corkboard binary.
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. `corkboard.toml` in the working directory, or the file named by
//!    `CORKBOARD_CONFIG`
//! 3. Environment variables such as `CORKBOARD__STORAGE__FS_PATH`
//!
//! `.env` files are read into the environment before any of this happens.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

mod logging;

pub use logging::init_logging;

pub const CONFIG_PATH_VAR: &str = "CORKBOARD_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "corkboard.toml";
const ENV_PREFIX: &str = "CORKBOARD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting `{key}`: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("failed to install logging: {0}")]
    Logging(String),
}

impl ConfigError {
    fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid { key, message: message.into() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub backup: BackupSettings,
    pub engine: EngineSettings,
    pub logging: LoggingSettings,
}

/// Storage backends, tried remote first, then filesystem, then SQLite.
/// Unset entries are skipped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub remote_url: Option<String>,
    pub fs_path: Option<PathBuf>,
    /// A file path or `sqlite::memory:`.
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    pub retention: usize,
    pub key_prefix: String,
    pub auto_interval_secs: u64,
    /// SQLite file holding backups. Kept in memory when unset.
    pub store_path: Option<String>,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            retention: 10,
            key_prefix: "corkboard-backup-".to_string(),
            auto_interval_secs: 300,
            store_path: None,
        }
    }
}

impl BackupSettings {
    pub fn auto_interval(&self) -> Duration {
        Duration::from_secs(self.auto_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub history_limit: usize,
    pub persist_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { history_limit: 50, persist_attempts: 3, backoff_base_ms: 100 }
    }
}

impl EngineSettings {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directives. `RUST_LOG` wins when set.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { filter: "info".to_string(), json: false }
    }
}

impl Settings {
    /// Loads `.env`, then layers the config file and environment over the
    /// defaults. An explicit `path` replaces the `CORKBOARD_CONFIG` lookup and
    /// must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => match std::env::var_os(CONFIG_PATH_VAR) {
                Some(path) => File::from(PathBuf::from(path)).required(true),
                None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
            },
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backup.retention < 1 {
            return Err(ConfigError::invalid("backup.retention", "must be at least 1"));
        }
        if self.engine.persist_attempts < 1 {
            return Err(ConfigError::invalid("engine.persist_attempts", "must be at least 1"));
        }
        if self.engine.history_limit < 1 {
            return Err(ConfigError::invalid("engine.history_limit", "must be at least 1"));
        }
        if !self.storage.has_driver() {
            return Err(ConfigError::invalid(
                "storage",
                "set at least one of remote_url, fs_path or sqlite_path",
            ));
        }
        Ok(())
    }
}

impl StorageSettings {
    pub fn has_driver(&self) -> bool {
        self.remote_url.is_some() || self.fs_path.is_some() || self.sqlite_path.is_some()
    }
}
