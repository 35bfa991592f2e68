//! # Embedded store (SQLite)
//!
//! Boards are stored whole, one JSON document per row, keyed by board id:
//!
//! ```sql
//! CREATE TABLE boards (id TEXT PRIMARY KEY NOT NULL, data TEXT NOT NULL);
//! ```
//!
//! Schema versions are tracked with `PRAGMA user_version`. Version 1 stored
//! free-floating notes in a `notes` table; opening such a database moves those
//! notes into a single board with a fixed id.
//!
//! # Developer Note
//! The upgrade runs inside one transaction so a crash mid-way leaves the v1
//! data untouched. A best-effort repair pass runs afterwards on every open and
//! only logs on failure.

use std::str::FromStr;

use async_trait::async_trait;
use domains::legacy::{migrate_legacy_note, migrated_board, MIGRATED_BOARD_NAME};
use domains::{Board, BoardId, DomainError, DriverHealth, KeyValueStore, Result, StorageDriver};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SCHEMA_VERSION: i64 = 2;

/// Id of the board that receives notes migrated from a v1 database.
pub const MIGRATED_BOARD_ID: Uuid = Uuid::from_u128(0x5f1c_0b2a_7d4e_4a10_9c3b_1e8f_6a2d_0001);

fn db_err(err: sqlx::Error) -> DomainError {
    DomainError::backend(err)
}

/// Opens (creating if needed) a pool for `url`, e.g. `sqlite://corkboard.db`
/// or `sqlite::memory:`.
pub async fn open_pool(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(db_err)?
        .create_if_missing(true);

    // A single long-lived connection keeps `sqlite::memory:` databases alive
    // and serializes writers.
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(db_err)
}

async fn schema_version(conn: &mut SqliteConnection) -> Result<i64> {
    sqlx::query_scalar("PRAGMA user_version").fetch_one(conn).await.map_err(db_err)
}

async fn table_exists(conn: &mut SqliteConnection, table: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_one(conn)
            .await
            .map_err(db_err)?;
    Ok(count > 0)
}

/// Moves v1 notes into the migrated board. Returns how many notes were moved.
async fn move_legacy_notes(conn: &mut SqliteConnection) -> Result<usize> {
    let rows = sqlx::query("SELECT id, data FROM notes").fetch_all(&mut *conn).await.map_err(db_err)?;
    if rows.is_empty() {
        return Ok(0);
    }

    let mut notes = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.try_get("id").map_err(db_err)?;
        let data: String = row.try_get("data").map_err(db_err)?;
        match serde_json::from_str::<serde_json::Value>(&data) {
            Ok(mut legacy) => {
                if legacy.get("id").is_none() {
                    legacy["id"] = serde_json::Value::String(id);
                }
                notes.push(migrate_legacy_note(&legacy));
            }
            Err(err) => warn!(note_id = %id, error = %err, "skipping unreadable legacy note"),
        }
    }

    let moved = notes.len();
    let board = migrated_board(MIGRATED_BOARD_ID, MIGRATED_BOARD_NAME, notes);
    sqlx::query("INSERT OR IGNORE INTO boards (id, data) VALUES (?, ?)")
        .bind(board.id.to_string())
        .bind(serde_json::to_string(&board)?)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(moved)
}

/// Brings the schema to [`SCHEMA_VERSION`] atomically.
async fn migrate(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await.map_err(db_err)?;

    let version = schema_version(&mut tx).await?;
    if version >= SCHEMA_VERSION {
        return Ok(());
    }

    sqlx::query("CREATE TABLE IF NOT EXISTS boards (id TEXT PRIMARY KEY NOT NULL, data TEXT NOT NULL)")
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

    if table_exists(&mut tx, "notes").await? {
        let moved = move_legacy_notes(&mut tx).await?;
        info!(moved, "migrated legacy notes into board {MIGRATED_BOARD_ID}");
    }

    sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
    tx.commit().await.map_err(db_err)?;
    debug!(from = version, to = SCHEMA_VERSION, "sqlite schema upgraded");
    Ok(())
}

/// Re-runs the legacy move when v1 notes exist but the migrated board is
/// missing, e.g. after another client bumped the version without moving them.
async fn repair(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await.map_err(db_err)?;
    if !table_exists(&mut tx, "notes").await? {
        return Ok(());
    }

    let present: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM boards WHERE id = ?")
        .bind(MIGRATED_BOARD_ID.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
    if present > 0 {
        return Ok(());
    }

    let moved = move_legacy_notes(&mut tx).await?;
    tx.commit().await.map_err(db_err)?;
    if moved > 0 {
        info!(moved, "repaired legacy note migration");
    }
    Ok(())
}

pub struct SqliteDriver {
    pool: SqlitePool,
}

impl SqliteDriver {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = open_pool(url).await?;
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, upgrading its schema first.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        migrate(&pool).await?;
        if let Err(err) = repair(&pool).await {
            warn!(error = %err, "legacy note repair pass failed");
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl StorageDriver for SqliteDriver {
    async fn load(&self) -> Result<Vec<Board>> {
        let rows = sqlx::query("SELECT id, data FROM boards ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut boards = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id").map_err(db_err)?;
            let data: String = row.try_get("data").map_err(db_err)?;
            match serde_json::from_str::<Board>(&data) {
                Ok(board) => boards.push(board),
                Err(err) => warn!(board_id = %id, error = %err, "skipping unreadable board row"),
            }
        }
        Ok(boards)
    }

    async fn save(&self, board: &Board) -> Result<()> {
        sqlx::query(
            "INSERT INTO boards (id, data) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
        )
        .bind(board.id.to_string())
        .bind(serde_json::to_string(board)?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, board_id: BoardId) -> Result<()> {
        sqlx::query("DELETE FROM boards WHERE id = ?")
            .bind(board_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn supports_backup(&self) -> bool {
        true
    }

    async fn health_check(&self) -> Result<DriverHealth> {
        let probe: std::result::Result<i64, _> =
            sqlx::query_scalar("SELECT COUNT(*) FROM boards").fetch_one(&self.pool).await;
        Ok(match probe {
            Ok(_) => DriverHealth::healthy(),
            Err(err) => DriverHealth::unhealthy("embedded store query failed").with_error(err),
        })
    }
}

/// Key-value namespace in its own table, suitable for backups.
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    pub async fn connect(url: &str) -> Result<Self> {
        Self::from_pool(open_pool(url).await?).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query("CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY NOT NULL, value TEXT NOT NULL)")
            .execute(&pool)
            .await
            .map_err(db_err)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT INTO kv (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT key FROM kv").fetch_all(&self.pool).await.map_err(db_err)
    }
}
