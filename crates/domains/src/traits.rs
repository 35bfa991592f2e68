//! # Core Traits (Ports)
//!
//! Any storage backend must implement these traits to be used by the engine.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::{Board, BoardId};

/// Outcome of a non-mutating driver probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriverHealth {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl DriverHealth {
    pub fn healthy() -> Self {
        Self { healthy: true, message: None, last_error: None }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self { healthy: false, message: Some(message.into()), last_error: None }
    }

    pub fn with_error(mut self, err: impl ToString) -> Self {
        self.last_error = Some(err.to_string());
        self
    }
}

/// Board persistence contract shared by every backend.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Returns every readable board. Unreadable items are skipped and logged;
    /// only an inaccessible backend is an error.
    async fn load(&self) -> Result<Vec<Board>>;

    /// Upserts one board. Saving the same id twice overwrites.
    async fn save(&self, board: &Board) -> Result<()>;

    /// Removes one board and its backend-local artifacts. Absent ids are a no-op.
    async fn delete(&self, board_id: BoardId) -> Result<()>;

    /// Whether multi-item writes are atomic in this backend.
    fn supports_transactions(&self) -> bool {
        false
    }

    /// Whether the backend can export/import its whole data set.
    fn supports_backup(&self) -> bool {
        false
    }

    /// Lightweight probe. `Err` means the driver is unavailable altogether;
    /// `Ok` with `healthy == false` means reachable but not fit for use.
    ///
    /// Backends without a dedicated probe fall back to a `load()`.
    async fn health_check(&self) -> Result<DriverHealth> {
        match self.load().await {
            Ok(_) => Ok(DriverHealth::healthy()),
            Err(err) => Ok(DriverHealth::unhealthy(err.to_string()).with_error(&err)),
        }
    }
}

/// Minimal string key-value surface used for the backup namespace.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    /// Every key currently stored, in no particular order.
    async fn keys(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;

    struct LoadOnly {
        fail: bool,
    }

    #[async_trait]
    impl StorageDriver for LoadOnly {
        async fn load(&self) -> Result<Vec<Board>> {
            if self.fail {
                return Err(DomainError::Backend("disk gone".into()));
            }
            Ok(vec![])
        }

        async fn save(&self, _board: &Board) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _board_id: BoardId) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn default_health_check_probes_load() {
        let ok = LoadOnly { fail: false }.health_check().await.unwrap();
        assert!(ok.healthy);

        let bad = LoadOnly { fail: true }.health_check().await.unwrap();
        assert!(!bad.healthy);
        assert_eq!(bad.message.as_deref(), Some("storage backend error: disk gone"));
    }

    #[test]
    fn capability_flags_default_to_false() {
        let driver = LoadOnly { fail: false };
        assert!(!driver.supports_transactions());
        assert!(!driver.supports_backup());
    }
}
