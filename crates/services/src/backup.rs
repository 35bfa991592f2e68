//! # Backup Manager
//!
//! Full snapshots of the board set, kept in their own key space so they
//! survive a driver switch. Each record is stored as
//! `{"metadata": {...}, "boards": [...]}` under `<prefix><backup-id>`.

use std::sync::{Arc, Mutex, PoisonError};

use domains::{now_millis, Board, DomainError, KeyValueStore, CURRENT_DATA_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_RETENTION: usize = 10;
pub const DEFAULT_KEY_PREFIX: &str = "corkboard-backup-";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup not found with ID {0}")]
    NotFound(String),

    #[error("invalid backup: {0}")]
    Invalid(String),

    #[error("backup serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] DomainError),
}

pub type Result<T> = std::result::Result<T, BackupError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub id: String,
    pub timestamp: i64,
    pub board_count: usize,
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupData {
    pub metadata: BackupMetadata,
    pub boards: Vec<Board>,
}

/// Listing only needs the header; `boards` is skipped by serde.
#[derive(Deserialize)]
struct Header {
    metadata: BackupMetadata,
}

pub struct BackupManager {
    store: Arc<dyn KeyValueStore>,
    retention: usize,
    prefix: String,
    last_timestamp: Mutex<i64>,
}

impl BackupManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            retention: DEFAULT_RETENTION,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
            last_timestamp: Mutex::new(0),
        }
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    /// Strictly increasing per manager so ids never collide within one process.
    fn next_timestamp(&self) -> i64 {
        let mut last = self.last_timestamp.lock().unwrap_or_else(PoisonError::into_inner);
        *last = now_millis().max(*last + 1);
        *last
    }

    /// Stores a deep copy of `boards` and prunes to the newest `retention`.
    pub async fn create_backup(&self, boards: &[Board]) -> Result<BackupMetadata> {
        let timestamp = self.next_timestamp();
        let metadata = BackupMetadata {
            id: format!("backup-{timestamp}"),
            timestamp,
            board_count: boards.len(),
            version: CURRENT_DATA_VERSION,
        };
        let data = BackupData { metadata: metadata.clone(), boards: boards.to_vec() };

        self.store.set(&self.key(&metadata.id), &serde_json::to_string(&data)?).await?;
        info!(backup_id = %metadata.id, boards = metadata.board_count, "backup created");

        self.prune().await?;
        Ok(metadata)
    }

    async fn prune(&self) -> Result<()> {
        let backups = self.list_backups().await?;
        for stale in backups.iter().skip(self.retention) {
            self.store.remove(&self.key(&stale.id)).await?;
            debug!(backup_id = %stale.id, "pruned old backup");
        }
        Ok(())
    }

    /// Metadata of every readable backup, newest first.
    pub async fn list_backups(&self) -> Result<Vec<BackupMetadata>> {
        let mut backups = Vec::new();
        for key in self.store.keys().await? {
            if !key.starts_with(&self.prefix) {
                continue;
            }
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_str::<Header>(&raw) {
                Ok(header) => backups.push(header.metadata),
                Err(err) => warn!(key = %key, error = %err, "skipping corrupt backup record"),
            }
        }
        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        Ok(backups)
    }

    pub async fn latest_backup(&self) -> Result<Option<BackupMetadata>> {
        Ok(self.list_backups().await?.into_iter().next())
    }

    /// The boards stored in a backup, exactly as they were saved.
    pub async fn restore_backup(&self, id: &str) -> Result<Vec<Board>> {
        let raw = self.export_backup(id).await?;
        let data: BackupData = serde_json::from_str(&raw)?;
        Ok(data.boards)
    }

    /// The raw stored record.
    pub async fn export_backup(&self, id: &str) -> Result<String> {
        self.store
            .get(&self.key(id))
            .await?
            .ok_or_else(|| BackupError::NotFound(id.to_string()))
    }

    /// Stores an exported record. Boards are not re-validated here.
    pub async fn import_backup(&self, json: &str) -> Result<BackupMetadata> {
        let value: Value = serde_json::from_str(json)?;
        let (Some(metadata), Some(boards)) = (value.get("metadata"), value.get("boards")) else {
            return Err(BackupError::Invalid("expected `metadata` and `boards` fields".into()));
        };
        if !boards.is_array() {
            return Err(BackupError::Invalid("`boards` must be an array".into()));
        }
        let metadata: BackupMetadata = serde_json::from_value(metadata.clone())
            .map_err(|err| BackupError::Invalid(format!("bad metadata: {err}")))?;
        if metadata.id.is_empty() {
            return Err(BackupError::Invalid("metadata.id must not be empty".into()));
        }

        self.store.set(&self.key(&metadata.id), json).await?;
        info!(backup_id = %metadata.id, "backup imported");
        Ok(metadata)
    }

    /// Removes one backup. Unknown ids are a no-op.
    pub async fn delete_backup(&self, id: &str) -> Result<()> {
        self.store.remove(&self.key(id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::MockKeyValueStore;
    use storage_adapters::MemoryKeyValueStore;

    fn manager() -> (Arc<MemoryKeyValueStore>, BackupManager) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let manager = BackupManager::new(store.clone());
        (store, manager)
    }

    #[tokio::test]
    async fn create_then_restore() {
        let (_, backups) = manager();
        let boards = vec![Board::new("A"), Board::new("B")];

        let meta = backups.create_backup(&boards).await.unwrap();
        assert!(meta.id.starts_with("backup-"));
        assert_eq!(meta.board_count, 2);
        assert_eq!(meta.version, CURRENT_DATA_VERSION);

        assert_eq!(backups.restore_backup(&meta.id).await.unwrap(), boards);
    }

    #[tokio::test]
    async fn retention_keeps_the_newest() {
        let (_, backups) = manager();
        let mut ids = Vec::new();
        for _ in 0..11 {
            ids.push(backups.create_backup(&[Board::new("x")]).await.unwrap().id);
        }

        let listed = backups.list_backups().await.unwrap();
        assert_eq!(listed.len(), DEFAULT_RETENTION);
        assert!(!listed.iter().any(|m| m.id == ids[0]));
        assert_eq!(listed[0].id, ids[10]);
        assert_eq!(backups.latest_backup().await.unwrap().unwrap().id, ids[10]);
    }

    #[tokio::test]
    async fn missing_backups_are_not_found() {
        let (_, backups) = manager();
        assert!(matches!(backups.restore_backup("nope").await, Err(BackupError::NotFound(_))));
        assert!(matches!(backups.export_backup("nope").await, Err(BackupError::NotFound(_))));
        assert!(backups.latest_backup().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_and_foreign_keys_are_ignored_in_listing() {
        let (store, backups) = manager();
        backups.create_backup(&[]).await.unwrap();
        store.set("corkboard-backup-broken", "{nope").await.unwrap();
        store.set("unrelated", "{}").await.unwrap();

        assert_eq!(backups.list_backups().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn export_import_round_trip() {
        let (_, source) = manager();
        let meta = source.create_backup(&[Board::new("Carry")]).await.unwrap();
        let exported = source.export_backup(&meta.id).await.unwrap();

        let (_, target) = manager();
        let imported = target.import_backup(&exported).await.unwrap();
        assert_eq!(imported, meta);
        assert_eq!(target.restore_backup(&meta.id).await.unwrap()[0].name, "Carry");
    }

    #[tokio::test]
    async fn import_requires_metadata_and_boards() {
        let (_, backups) = manager();
        assert!(matches!(
            backups.import_backup(r#"{"boards": []}"#).await,
            Err(BackupError::Invalid(_))
        ));
        assert!(matches!(
            backups.import_backup(r#"{"metadata": {"id": "b", "timestamp": 1, "boardCount": 0, "version": 1}, "boards": {}}"#).await,
            Err(BackupError::Invalid(_))
        ));
        assert!(matches!(backups.import_backup("nope").await, Err(BackupError::Serialization(_))));
    }

    #[tokio::test]
    async fn delete_backup_removes_the_record() {
        let (_, backups) = manager();
        let meta = backups.create_backup(&[]).await.unwrap();
        backups.delete_backup(&meta.id).await.unwrap();
        backups.delete_backup(&meta.id).await.unwrap();
        assert!(backups.list_backups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_failures_surface() {
        let mut store = MockKeyValueStore::new();
        store.expect_set().returning(|_, _| Err(DomainError::Backend("quota exceeded".into())));
        let backups = BackupManager::new(Arc::new(store));

        let err = backups.create_backup(&[]).await.unwrap_err();
        assert!(matches!(err, BackupError::Store(DomainError::Backend(_))));
    }

    #[tokio::test]
    async fn custom_prefix_and_retention() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let backups = BackupManager::new(store.clone()).with_prefix("bk:").with_retention(2);
        for _ in 0..3 {
            backups.create_backup(&[]).await.unwrap();
        }
        let keys = store.keys().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.starts_with("bk:")));
    }
}
