//! # Core events
//!
//! Everything the engine announces to observers. Subscribers receive a
//! `tokio::sync::broadcast` receiver; dropping it unsubscribes.

use domains::{Board, BoardId, Note, NoteId};
use serde::Serialize;

use crate::backup::BackupMetadata;

/// Discriminator carried by [`CoreEvent::CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CoreErrorKind {
    LoadFailed,
    InvalidBoard,
    ValidationFailed,
    NotFound,
    PersistFailed,
    DeleteFailed,
    UndoFailed,
    RedoFailed,
    TransactionFailed,
    BackupFailed,
    RestoreFailed,
    LegacyImportFailed,
    FlushSyncFailed,
}

/// Work queued for plugins' `on_sync` hooks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SyncEvent {
    Update { board: Board },
    Delete { board_id: BoardId },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CoreEvent {
    BoardCreated { board: Board },
    BoardUpdated { board: Board },
    BoardDeleted { board_id: BoardId },
    NoteCreated { board_id: BoardId, note: Note },
    NoteUpdated { board_id: BoardId, note: Note },
    NoteDeleted { board_id: BoardId, note_id: NoteId },
    HistoryChanged { can_undo: bool, can_redo: bool },
    BackupCreated { metadata: BackupMetadata },
    BackupRestored { backup_id: String, board_count: usize },
    BackupImported { metadata: BackupMetadata },
    LegacyDataImported { board_count: usize },
    SyncQueued { pending: usize },
    SyncFlushed { count: usize },
    CoreError { kind: CoreErrorKind, message: String },
}
