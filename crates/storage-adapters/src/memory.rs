//! # In-memory adapters
//!
//! Process-local driver and key-value store. Used as a last-resort fallback
//! and as the default backup store when nothing durable is configured.

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{Board, BoardId, DriverHealth, KeyValueStore, Result, StorageDriver};

#[derive(Debug, Default)]
pub struct MemoryDriver {
    boards: DashMap<BoardId, Board>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }
}

#[async_trait]
impl StorageDriver for MemoryDriver {
    async fn load(&self) -> Result<Vec<Board>> {
        let mut boards: Vec<Board> = self.boards.iter().map(|e| e.value().clone()).collect();
        boards.sort_by_key(|b| (b.created_at, b.id));
        Ok(boards)
    }

    async fn save(&self, board: &Board) -> Result<()> {
        self.boards.insert(board.id, board.clone());
        Ok(())
    }

    async fn delete(&self, board_id: BoardId) -> Result<()> {
        self.boards.remove(&board_id);
        Ok(())
    }

    fn supports_backup(&self) -> bool {
        true
    }

    async fn health_check(&self) -> Result<DriverHealth> {
        Ok(DriverHealth::healthy())
    }
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: DashMap<String, String>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_overwrites_by_id() {
        let driver = MemoryDriver::new();
        let mut board = Board::new("One");
        driver.save(&board).await.unwrap();
        board.name = "Uno".into();
        driver.save(&board).await.unwrap();

        let boards = driver.load().await.unwrap();
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].name, "Uno");
    }

    #[tokio::test]
    async fn delete_of_missing_board_is_a_no_op() {
        let driver = MemoryDriver::new();
        tokio_test::assert_ok!(driver.delete(uuid::Uuid::new_v4()).await);
        assert!(driver.is_empty());
    }

    #[tokio::test]
    async fn kv_round_trip() {
        let kv = MemoryKeyValueStore::new();
        kv.set("a", "1").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(kv.keys().await.unwrap(), vec!["a".to_string()]);
        kv.remove("a").await.unwrap();
        assert!(kv.get("a").await.unwrap().is_none());
    }
}
