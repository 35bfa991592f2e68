//! Shared fixtures for the cross-crate scenario tests under `tests/`.

use std::sync::Arc;

use domains::{Board, StorageDriver};
use services::{BackupManager, CoreEvent, Engine, EngineConfig};
use storage_adapters::{MemoryDriver, MemoryKeyValueStore};
use tokio::sync::broadcast::{error::TryRecvError, Receiver};

/// An engine over fresh in-memory storage, already initialized.
pub async fn memory_engine() -> Arc<Engine> {
    engine_over(Arc::new(MemoryDriver::new())).await
}

pub async fn engine_over(driver: Arc<dyn StorageDriver>) -> Arc<Engine> {
    engine_with(driver, Arc::new(MemoryKeyValueStore::new()), EngineConfig::default()).await
}

pub async fn engine_with(
    driver: Arc<dyn StorageDriver>,
    store: Arc<MemoryKeyValueStore>,
    config: EngineConfig,
) -> Arc<Engine> {
    let engine = Engine::with_config(driver, BackupManager::new(store), config);
    engine.init().await.expect("engine init");
    engine
}

/// Every event received so far, without waiting.
pub fn drain(rx: &mut Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return events,
        }
    }
}

pub fn names(boards: &[Board]) -> Vec<&str> {
    boards.iter().map(|b| b.name.as_str()).collect()
}
