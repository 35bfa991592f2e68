//! Assembles drivers, backup store and engine from [`Settings`].

use std::sync::Arc;

use anyhow::{Context, Result};
use configs::Settings;
use domains::{KeyValueStore, StorageDriver};
use services::{BackupManager, Engine, EngineConfig};
use storage_adapters::{DriverManager, FilesystemDriver, MemoryKeyValueStore, NamedDriver};
use tracing::{info, warn};

pub struct App {
    pub drivers: Arc<DriverManager>,
    pub engine: Arc<Engine>,
}

impl App {
    /// Builds the stack, selects a driver and loads every board.
    pub async fn start(settings: &Settings) -> Result<Self> {
        // 1. Storage drivers, in priority order
        let drivers = Arc::new(DriverManager::new(build_drivers(settings).await?));
        drivers.initialize().await.context("no usable storage driver")?;
        match drivers.active_driver_name() {
            Some(name) if drivers.fallback_reason().is_empty() => info!(driver = %name, "storage ready"),
            Some(name) => warn!(driver = %name, reason = %drivers.fallback_reason(), "storage degraded"),
            None => {}
        }

        // 2. Backup namespace
        let backups = BackupManager::new(backup_store(settings).await?)
            .with_retention(settings.backup.retention)
            .with_prefix(settings.backup.key_prefix.clone());

        // 3. Engine
        let config = EngineConfig {
            history_limit: settings.engine.history_limit,
            persist_attempts: settings.engine.persist_attempts,
            backoff_base: settings.engine.backoff_base(),
            auto_backup_interval: settings.backup.auto_interval(),
        };
        let storage: Arc<dyn StorageDriver> = drivers.clone();
        let engine = Engine::with_config(storage, backups, config);
        engine.init().await.context("failed to load boards")?;

        Ok(Self { drivers, engine })
    }
}

async fn build_drivers(settings: &Settings) -> Result<Vec<NamedDriver>> {
    let storage = &settings.storage;
    let mut drivers = Vec::new();

    if let Some(url) = &storage.remote_url {
        #[cfg(feature = "remote-http")]
        {
            let remote = storage_adapters::RemoteDriver::new(url.clone())
                .with_context(|| format!("failed to build remote driver for {url}"))?;
            drivers.push(NamedDriver::new("remote", Arc::new(remote)));
        }
        #[cfg(not(feature = "remote-http"))]
        warn!(url = %url, "remote storage configured but the remote-http feature is disabled");
    }

    if let Some(path) = &storage.fs_path {
        drivers.push(NamedDriver::new("filesystem", Arc::new(FilesystemDriver::new(path.clone()))));
    }

    if let Some(path) = &storage.sqlite_path {
        #[cfg(feature = "db-sqlite")]
        {
            let sqlite = storage_adapters::SqliteDriver::connect(path)
                .await
                .with_context(|| format!("failed to open SQLite database {path}"))?;
            drivers.push(NamedDriver::new("sqlite", Arc::new(sqlite)));
        }
        #[cfg(not(feature = "db-sqlite"))]
        warn!(path = %path, "SQLite storage configured but the db-sqlite feature is disabled");
    }

    Ok(drivers)
}

async fn backup_store(settings: &Settings) -> Result<Arc<dyn KeyValueStore>> {
    match &settings.backup.store_path {
        #[cfg(feature = "db-sqlite")]
        Some(path) => {
            let store = storage_adapters::SqliteKeyValueStore::connect(path)
                .await
                .with_context(|| format!("failed to open backup store {path}"))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "db-sqlite"))]
        Some(path) => {
            warn!(path = %path, "backup store path ignored without the db-sqlite feature; backups stay in memory");
            Ok(Arc::new(MemoryKeyValueStore::new()))
        }
        None => Ok(Arc::new(MemoryKeyValueStore::new())),
    }
}
