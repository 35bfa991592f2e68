//! # Filesystem driver
//!
//! One directory per board under a root path:
//!
//! ```text
//! <root>/<board-id>/board.json
//! <root>/<board-id>/assets/
//! ```
//!
//! `board.json` is rewritten through a temporary file and a rename so a
//! crash never leaves a half-written document behind.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use domains::{Board, BoardId, DriverHealth, Result, StorageDriver};
use tokio::fs;
use tracing::warn;

const BOARD_FILE: &str = "board.json";
const ASSETS_DIR: &str = "assets";

pub struct FilesystemDriver {
    /// Root directory holding one sub-directory per board (e.g. "./data/boards")
    root_path: PathBuf,
}

impl FilesystemDriver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root_path: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    fn board_dir(&self, board_id: BoardId) -> PathBuf {
        self.root_path.join(board_id.to_string())
    }

    /// Directory where asset files for `board_id` live. Asset content itself
    /// is managed outside this driver.
    pub fn assets_dir(&self, board_id: BoardId) -> PathBuf {
        self.board_dir(board_id).join(ASSETS_DIR)
    }

    async fn read_board(path: &Path) -> Option<Board> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable board file");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(board) => Some(board),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping corrupt board file");
                None
            }
        }
    }

    /// A missing root is fine as long as the closest existing ancestor is a
    /// directory it can be created under.
    async fn root_creatable(&self) -> io::Result<()> {
        for ancestor in self.root_path.ancestors().skip(1) {
            match fs::metadata(ancestor).await {
                Ok(meta) if meta.is_dir() => return Ok(()),
                Ok(_) => return Err(io::Error::other(format!("{} is not a directory", ancestor.display()))),
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageDriver for FilesystemDriver {
    async fn load(&self) -> Result<Vec<Board>> {
        fs::create_dir_all(&self.root_path).await?;

        let mut boards = Vec::new();
        let mut entries = fs::read_dir(&self.root_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            match entry.file_type().await {
                Ok(kind) if kind.is_dir() => {}
                Ok(_) => continue,
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            }
            if let Some(board) = Self::read_board(&entry.path().join(BOARD_FILE)).await {
                boards.push(board);
            }
        }
        boards.sort_by_key(|b| (b.created_at, b.id));
        Ok(boards)
    }

    async fn save(&self, board: &Board) -> Result<()> {
        // 1. Ensure the board and asset directories exist
        fs::create_dir_all(self.assets_dir(board.id)).await?;

        // 2. Write to a sibling temp file, then swap it in
        let dir = self.board_dir(board.id);
        let tmp = dir.join(format!("{BOARD_FILE}.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(board)?).await?;
        fs::rename(&tmp, dir.join(BOARD_FILE)).await?;
        Ok(())
    }

    async fn delete(&self, board_id: BoardId) -> Result<()> {
        match fs::remove_dir_all(self.board_dir(board_id)).await {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn supports_backup(&self) -> bool {
        true
    }

    async fn health_check(&self) -> Result<DriverHealth> {
        // Read-only probe; the root is only created by load and save.
        let probe = async {
            match fs::metadata(&self.root_path).await {
                Ok(_) => fs::read_dir(&self.root_path).await.map(drop),
                Err(err) if err.kind() == ErrorKind::NotFound => self.root_creatable().await,
                Err(err) => Err(err),
            }
        };
        Ok(match probe.await {
            Ok(()) => DriverHealth::healthy(),
            Err(err) => DriverHealth::unhealthy(format!(
                "board directory {} is not accessible",
                self.root_path.display()
            ))
            .with_error(err),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::Note;
    use tempfile::TempDir;

    fn driver() -> (TempDir, FilesystemDriver) {
        let dir = TempDir::new().unwrap();
        let driver = FilesystemDriver::new(dir.path().join("boards"));
        (dir, driver)
    }

    #[tokio::test]
    async fn writes_one_directory_per_board() {
        let (_dir, driver) = driver();
        let mut board = Board::new("On disk");
        board.notes.push(Note::new());
        driver.save(&board).await.unwrap();

        let board_dir = driver.root().join(board.id.to_string());
        assert!(board_dir.join("board.json").is_file());
        assert!(driver.assets_dir(board.id).is_dir());
        assert!(!board_dir.join("board.json.tmp").exists());

        assert_eq!(driver.load().await.unwrap(), vec![board]);
    }

    #[tokio::test]
    async fn delete_removes_the_directory_and_tolerates_absence() {
        let (_dir, driver) = driver();
        let board = Board::new("Gone");
        driver.save(&board).await.unwrap();

        driver.delete(board.id).await.unwrap();
        assert!(!driver.root().join(board.id.to_string()).exists());
        driver.delete(board.id).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_and_stray_entries_are_skipped() {
        let (_dir, driver) = driver();
        let board = Board::new("Fine");
        driver.save(&board).await.unwrap();

        let broken = driver.root().join("broken");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join("board.json"), "{oops").unwrap();
        std::fs::create_dir_all(driver.root().join("empty")).unwrap();
        std::fs::write(driver.root().join("stray.txt"), "x").unwrap();

        let loaded = driver.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, board.id);
    }

    #[tokio::test]
    async fn unusable_root_is_unhealthy() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();

        let driver = FilesystemDriver::new(&file);
        let health = driver.health_check().await.unwrap();
        assert!(!health.healthy);
        assert!(health.last_error.is_some());
        assert!(driver.load().await.is_err());
    }

    #[tokio::test]
    async fn health_check_leaves_the_disk_alone() {
        let (_dir, driver) = driver();
        let health = driver.health_check().await.unwrap();
        assert!(health.healthy);
        assert!(!driver.root().exists());
    }

    #[tokio::test]
    async fn root_under_a_file_is_unhealthy() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();

        let health = FilesystemDriver::new(file.join("boards")).health_check().await.unwrap();
        assert!(!health.healthy);
    }

    #[test]
    fn capabilities() {
        let driver = FilesystemDriver::new("/tmp/unused");
        assert!(!driver.supports_transactions());
        assert!(driver.supports_backup());
    }
}
