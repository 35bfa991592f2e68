//! # Remote driver
//!
//! Read-only client for a network endpoint that serves the board list as a
//! JSON array. Writes are not implemented yet: `save` and `delete` log and
//! succeed without touching the endpoint, so the health probe reports the
//! driver as unhealthy and the manager never prefers it.

use std::time::Duration;

use async_trait::async_trait;
use domains::{Board, BoardId, DomainError, DriverHealth, Result, StorageDriver};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::warn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const WRITES_UNSUPPORTED: &str = "remote writes are not implemented; driver is read-only";

pub struct RemoteDriver {
    client: Client,
    url: String,
}

impl RemoteDriver {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(DomainError::backend)?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<reqwest::Response> {
        self.client.get(&self.url).send().await.map_err(DomainError::backend)
    }
}

#[async_trait]
impl StorageDriver for RemoteDriver {
    async fn load(&self) -> Result<Vec<Board>> {
        let response = self.fetch().await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Ok(Vec::new()),
            status if !status.is_success() => {
                return Err(DomainError::Backend(format!("remote endpoint returned {status}")));
            }
            _ => {}
        }

        let body: Value = response.json().await.map_err(DomainError::backend)?;
        let Value::Array(items) = body else {
            warn!(url = %self.url, "remote payload is not a board array");
            return Ok(Vec::new());
        };

        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Board>(item) {
                Ok(board) => Some(board),
                Err(err) => {
                    warn!(url = %self.url, error = %err, "skipping malformed remote board");
                    None
                }
            })
            .collect())
    }

    async fn save(&self, board: &Board) -> Result<()> {
        warn!(board_id = %board.id, "{WRITES_UNSUPPORTED}; save dropped");
        Ok(())
    }

    async fn delete(&self, board_id: BoardId) -> Result<()> {
        warn!(%board_id, "{WRITES_UNSUPPORTED}; delete dropped");
        Ok(())
    }

    /// Reachability is checked with the same GET used by `load`. A reachable
    /// endpoint is still unhealthy because writes would be silently dropped.
    async fn health_check(&self) -> Result<DriverHealth> {
        let response = self.fetch().await?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(DriverHealth::unhealthy(WRITES_UNSUPPORTED))
        } else {
            Ok(DriverHealth::unhealthy(WRITES_UNSUPPORTED)
                .with_error(format!("remote endpoint returned {status}")))
        }
    }
}
