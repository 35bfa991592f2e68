//! # Engine
//!
//! Owns the in-memory board map and is the only mutation path into storage.
//! Every mutation is validated, applied to memory, persisted with retries,
//! recorded for undo, handed to plugins and announced on the event channel,
//! in that order.
//!
//! # Developer Note
//! The map lives behind a plain `std::sync::Mutex` that is never held across
//! an `.await`. Concurrent non-transactional mutations are not serialized
//! against each other; the last write to reach the driver wins. Use
//! [`Engine::transaction`] when a group of calls must not interleave.
//!
//! A persist that exhausts its retries leaves the in-memory change in place.
//! The board is listed by [`Engine::unsynced_boards`] until it is saved
//! successfully again.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use domains::legacy::import_legacy_json;
use domains::sanitize::sanitize_board;
use domains::validation::{validate_board, validate_board_patch, validate_note, validate_note_patch};
use domains::{
    now_millis, Board, BoardId, BoardPatch, DomainError, Note, NoteId, NotePatch, StorageDriver,
    ValidationError,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backup::{BackupManager, BackupMetadata};
use crate::error::{CoreError, Result};
use crate::events::{CoreErrorKind, CoreEvent, SyncEvent};
use crate::history::{
    Change, Direction, HistoryEntry, HistoryManager, Replay, Transition, DEFAULT_HISTORY_LIMIT,
};
use crate::hooks::{spawn_dispatcher, Hook, Task};
use crate::plugin::Plugin;
use crate::transaction::TransactionQueue;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub history_limit: usize,
    /// Total save attempts per persist, including the first.
    pub persist_attempts: u32,
    /// Delay after the first failed attempt; doubles after each further one.
    pub backoff_base: Duration,
    /// Minimum spacing between automatic backups.
    pub auto_backup_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            persist_attempts: 3,
            backoff_base: Duration::from_millis(100),
            auto_backup_interval: Duration::from_secs(5 * 60),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hook and event owed for a change that has reached storage.
#[must_use]
struct Applied {
    hook: Hook,
    event: CoreEvent,
}

pub struct Engine {
    driver: Arc<dyn StorageDriver>,
    backups: BackupManager,
    config: EngineConfig,
    boards: Mutex<HashMap<BoardId, Board>>,
    history: Mutex<HistoryManager>,
    unsynced: Mutex<HashSet<BoardId>>,
    sync_queue: Mutex<Vec<SyncEvent>>,
    plugins: Mutex<Vec<Arc<dyn Plugin>>>,
    last_auto_backup: Mutex<Option<Instant>>,
    transactions: TransactionQueue,
    events: broadcast::Sender<CoreEvent>,
    hooks: mpsc::UnboundedSender<Task>,
}

impl Engine {
    pub fn new(driver: Arc<dyn StorageDriver>, backups: BackupManager) -> Arc<Self> {
        Self::with_config(driver, backups, EngineConfig::default())
    }

    /// Builds the engine and spawns its hook dispatcher, so this must run
    /// inside a Tokio runtime. Call [`Engine::init`] before use.
    pub fn with_config(
        driver: Arc<dyn StorageDriver>,
        backups: BackupManager,
        config: EngineConfig,
    ) -> Arc<Self> {
        let history = HistoryManager::new(config.history_limit);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new_cyclic(|engine| Self {
            driver,
            backups,
            config,
            boards: Mutex::new(HashMap::new()),
            history: Mutex::new(history),
            unsynced: Mutex::new(HashSet::new()),
            sync_queue: Mutex::new(Vec::new()),
            plugins: Mutex::new(Vec::new()),
            last_auto_backup: Mutex::new(None),
            transactions: TransactionQueue::default(),
            events,
            hooks: spawn_dispatcher(engine.clone()),
        })
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Loads every board from the driver, dropping (and announcing) the ones
    /// that fail validation.
    pub async fn init(&self) -> Result<()> {
        let loaded = match self.driver.load().await {
            Ok(boards) => boards,
            Err(err) => return Err(self.report(CoreErrorKind::LoadFailed, err)),
        };

        let total = loaded.len();
        let mut boards = HashMap::with_capacity(total);
        for board in loaded {
            match validate_board(&board) {
                Ok(()) => {
                    boards.insert(board.id, board);
                }
                Err(err) => self.reject_invalid(board.id, &err),
            }
        }

        let count = boards.len();
        *lock(&self.boards) = boards;
        self.queue_hook(Hook::Init);
        info!(boards = count, skipped = total - count, "engine initialized");
        Ok(())
    }

    pub fn driver(&self) -> &Arc<dyn StorageDriver> {
        &self.driver
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Every board, oldest first.
    pub fn all_boards(&self) -> Vec<Board> {
        let mut boards: Vec<Board> = lock(&self.boards).values().cloned().collect();
        boards.sort_by_key(|b| (b.created_at, b.id));
        boards
    }

    pub fn board(&self, board_id: BoardId) -> Option<Board> {
        lock(&self.boards).get(&board_id).cloned()
    }

    pub fn all_notes(&self) -> Vec<Note> {
        self.all_boards().into_iter().flat_map(|b| b.notes).collect()
    }

    pub fn note(&self, note_id: NoteId) -> Option<Note> {
        lock(&self.boards).values().find_map(|b| b.note(note_id).cloned())
    }

    /// Id of the board that owns `note_id`.
    pub fn note_board(&self, note_id: NoteId) -> Option<BoardId> {
        lock(&self.boards).values().find(|b| b.note(note_id).is_some()).map(|b| b.id)
    }

    pub fn can_undo(&self) -> bool {
        lock(&self.history).can_undo()
    }

    pub fn can_redo(&self) -> bool {
        lock(&self.history).can_redo()
    }

    /// Boards whose latest change is in memory but failed to persist.
    pub fn unsynced_boards(&self) -> Vec<BoardId> {
        lock(&self.unsynced).iter().copied().collect()
    }

    // ── Boards ──────────────────────────────────────────────────────────────

    pub async fn create_board(&self, patch: BoardPatch) -> Result<Board> {
        let board = self.build_board(patch).map_err(|e| self.report(CoreErrorKind::ValidationFailed, e))?;

        let applied = self.store_board(board.clone()).await?;
        self.record(HistoryEntry::board(Transition::Created(Box::new(board.clone()))));
        self.publish(applied);
        Ok(board)
    }

    fn build_board(&self, patch: BoardPatch) -> std::result::Result<Board, ValidationError> {
        let patch = validate_board_patch(patch)?;

        let mut board = Board::new(Board::DEFAULT_NAME);
        if let Some(id) = patch.id {
            board.id = id;
        }
        board.apply(patch);

        if lock(&self.boards).contains_key(&board.id) {
            return Err(ValidationError::single("board", "id", format!("board {} already exists", board.id)));
        }
        validate_board(&board)?;
        Ok(board)
    }

    /// Returns `None` when the board does not exist.
    pub async fn update_board(&self, board_id: BoardId, patch: BoardPatch) -> Result<Option<Board>> {
        let patch = validate_board_patch(patch).map_err(|e| self.report(CoreErrorKind::ValidationFailed, e))?;
        let Some(before) = self.board(board_id) else {
            return Ok(None);
        };

        let mut after = before.clone();
        after.apply(patch);
        after.touch();
        validate_board(&after).map_err(|e| self.report(CoreErrorKind::ValidationFailed, e))?;

        let applied = self.store_board(after.clone()).await?;
        self.record(HistoryEntry::board(Transition::Updated {
            before: Box::new(before),
            after: Box::new(after.clone()),
        }));
        self.publish(applied);
        Ok(Some(after))
    }

    /// Deleting an unknown board is a no-op.
    pub async fn delete_board(&self, board_id: BoardId) -> Result<()> {
        if let Some((board, applied)) = self.remove_board(board_id).await? {
            self.record(HistoryEntry::board(Transition::Deleted(Box::new(board))));
            self.publish(applied);
        }
        Ok(())
    }

    // ── Notes ───────────────────────────────────────────────────────────────

    pub async fn create_note(&self, board_id: BoardId, patch: NotePatch) -> Result<Note> {
        let patch = validate_note_patch(patch).map_err(|e| self.report(CoreErrorKind::ValidationFailed, e))?;

        let mut note = Note::new();
        if let Some(id) = patch.id {
            note.id = id;
        }
        note.apply(patch);
        validate_note(&note).map_err(|e| self.report(CoreErrorKind::ValidationFailed, e))?;

        if self.read_board(board_id, |b| b.note(note.id).is_some())? {
            let err = ValidationError::single("note", "id", format!("note {} already exists", note.id));
            return Err(self.report(CoreErrorKind::ValidationFailed, err));
        }

        let applied = self.store_note(board_id, note.clone()).await?;
        self.record(HistoryEntry::note(board_id, Transition::Created(note.clone())));
        self.publish(applied);
        Ok(note)
    }

    /// Returns `None` when the note does not exist on the board. A missing
    /// board is an error.
    pub async fn update_note(
        &self,
        board_id: BoardId,
        note_id: NoteId,
        patch: NotePatch,
    ) -> Result<Option<Note>> {
        let patch = validate_note_patch(patch).map_err(|e| self.report(CoreErrorKind::ValidationFailed, e))?;
        let Some(before) = self.read_board(board_id, |b| b.note(note_id).cloned())? else {
            return Ok(None);
        };

        let mut after = before.clone();
        after.apply(patch);
        after.updated_at = now_millis().max(after.created_at);
        validate_note(&after).map_err(|e| self.report(CoreErrorKind::ValidationFailed, e))?;

        let applied = self.store_note(board_id, after.clone()).await?;
        self.record(HistoryEntry::note(board_id, Transition::Updated { before, after: after.clone() }));
        self.publish(applied);
        Ok(Some(after))
    }

    /// Deleting an unknown note is a no-op; a missing board is an error.
    pub async fn delete_note(&self, board_id: BoardId, note_id: NoteId) -> Result<()> {
        if let Some((note, applied)) = self.remove_note(board_id, note_id).await? {
            self.record(HistoryEntry::note(board_id, Transition::Deleted(note)));
            self.publish(applied);
        }
        Ok(())
    }

    // ── Undo / redo ─────────────────────────────────────────────────────────

    /// Reverts the latest recorded change. `false` when there is nothing to
    /// undo or the replay failed; the cursor is left unchanged on failure.
    pub async fn undo(&self) -> bool {
        let entry = lock(&self.history).undo();
        let Some(entry) = entry else {
            return false;
        };

        let ok = match self.replay(&entry, Direction::Undo).await {
            Ok(()) => true,
            Err(err) => {
                lock(&self.history).redo();
                self.report(CoreErrorKind::UndoFailed, err);
                false
            }
        };
        self.announce_history();
        ok
    }

    /// Re-applies the next undone change. Mirrors [`Engine::undo`].
    pub async fn redo(&self) -> bool {
        let entry = lock(&self.history).redo();
        let Some(entry) = entry else {
            return false;
        };

        let ok = match self.replay(&entry, Direction::Redo).await {
            Ok(()) => true,
            Err(err) => {
                lock(&self.history).undo();
                self.report(CoreErrorKind::RedoFailed, err);
                false
            }
        };
        self.announce_history();
        ok
    }

    /// Applies a captured snapshot. Replays never record history; the cursor
    /// has already moved by the time the change is published.
    async fn replay(&self, entry: &HistoryEntry, direction: Direction) -> Result<()> {
        debug!(kind = ?entry.kind(), action = ?entry.action(), ?direction, "replaying history entry");
        let applied = match &entry.change {
            Change::Board(transition) => match transition.replay(direction) {
                Replay::Put(board) => Some(self.store_board(Board::clone(board)).await?),
                Replay::Remove(board) => self.remove_board(board.id).await?.map(|(_, a)| a),
            },
            Change::Note { board_id, transition } => match transition.replay(direction) {
                Replay::Put(note) => Some(self.store_note(*board_id, note.clone()).await?),
                Replay::Remove(note) => self.remove_note(*board_id, note.id).await?.map(|(_, a)| a),
            },
        };
        if let Some(applied) = applied {
            self.publish(applied);
        }
        Ok(())
    }

    // ── Transactions ────────────────────────────────────────────────────────

    /// Runs `f` once every earlier transaction has finished. If `f` fails,
    /// transactions already waiting are aborted with
    /// [`CoreError::TransactionAborted`]. Calling `transaction` from inside
    /// `f` deadlocks.
    pub async fn transaction<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut turn = match self.transactions.acquire().await {
            Ok(turn) => turn,
            Err(err) => return Err(self.report(CoreErrorKind::TransactionFailed, err)),
        };

        let result = f().await;
        if result.is_err() {
            turn.fail();
        }
        drop(turn);
        result.map_err(|err| self.report(CoreErrorKind::TransactionFailed, err))
    }

    // ── Legacy import ───────────────────────────────────────────────────────

    /// Converts a legacy export and adds its boards. Boards whose id is taken
    /// get a fresh one. Runs as a single transaction.
    pub async fn import_legacy_data(&self, json: &str) -> Result<Vec<Board>> {
        let mut boards = import_legacy_json(json).map_err(|e| self.report(CoreErrorKind::LegacyImportFailed, e))?;
        for board in &mut boards {
            sanitize_board(board);
            validate_board(board).map_err(|e| self.report(CoreErrorKind::LegacyImportFailed, e))?;
        }

        let imported = self
            .transaction(move || async move {
                let mut imported = Vec::with_capacity(boards.len());
                for mut board in boards {
                    if lock(&self.boards).contains_key(&board.id) {
                        let fresh = Uuid::new_v4();
                        debug!(from = %board.id, to = %fresh, "renaming colliding legacy board");
                        board.id = fresh;
                    }
                    let applied = self.store_board(board.clone()).await?;
                    self.record(HistoryEntry::board(Transition::Created(Box::new(board.clone()))));
                    self.publish(applied);
                    imported.push(board);
                }
                Ok::<_, CoreError>(imported)
            })
            .await?;

        info!(boards = imported.len(), "legacy data imported");
        self.emit(CoreEvent::LegacyDataImported { board_count: imported.len() });
        Ok(imported)
    }

    // ── Backups ─────────────────────────────────────────────────────────────

    pub async fn create_backup(&self) -> Result<BackupMetadata> {
        let boards = self.all_boards();
        let metadata = self
            .backups
            .create_backup(&boards)
            .await
            .map_err(|e| self.report(CoreErrorKind::BackupFailed, e))?;
        self.emit(CoreEvent::BackupCreated { metadata: metadata.clone() });
        Ok(metadata)
    }

    pub async fn list_backups(&self) -> Result<Vec<BackupMetadata>> {
        self.backups.list_backups().await.map_err(|e| self.report(CoreErrorKind::BackupFailed, e))
    }

    pub async fn latest_backup(&self) -> Result<Option<BackupMetadata>> {
        self.backups.latest_backup().await.map_err(|e| self.report(CoreErrorKind::BackupFailed, e))
    }

    /// Replaces every board with the backup's contents and clears history.
    /// Boards absent from the backup are deleted from storage too.
    pub async fn restore_backup(&self, backup_id: &str) -> Result<Vec<Board>> {
        let stored = self
            .backups
            .restore_backup(backup_id)
            .await
            .map_err(|e| self.report(CoreErrorKind::RestoreFailed, e))?;

        let mut restored = Vec::with_capacity(stored.len());
        for mut board in stored {
            sanitize_board(&mut board);
            match validate_board(&board) {
                Ok(()) => restored.push(board),
                Err(err) => self.reject_invalid(board.id, &err),
            }
        }

        let stale: Vec<BoardId> = {
            let mut boards = lock(&self.boards);
            let keep: HashSet<BoardId> = restored.iter().map(|b| b.id).collect();
            let stale = boards.keys().filter(|id| !keep.contains(id)).copied().collect();
            boards.clear();
            boards.extend(restored.iter().map(|b| (b.id, b.clone())));
            stale
        };

        for board_id in stale {
            self.driver
                .delete(board_id)
                .await
                .map_err(|e| self.report(CoreErrorKind::RestoreFailed, e))?;
            self.enqueue_sync(SyncEvent::Delete { board_id });
        }
        for board in &restored {
            self.persist(board).await?;
        }

        lock(&self.history).clear();
        self.announce_history();
        info!(backup_id, boards = restored.len(), "backup restored");
        self.emit(CoreEvent::BackupRestored {
            backup_id: backup_id.to_string(),
            board_count: restored.len(),
        });
        Ok(restored)
    }

    pub async fn export_backup(&self, backup_id: &str) -> Result<String> {
        self.backups.export_backup(backup_id).await.map_err(|e| self.report(CoreErrorKind::BackupFailed, e))
    }

    pub async fn import_backup(&self, json: &str) -> Result<BackupMetadata> {
        let metadata = self
            .backups
            .import_backup(json)
            .await
            .map_err(|e| self.report(CoreErrorKind::BackupFailed, e))?;
        self.emit(CoreEvent::BackupImported { metadata: metadata.clone() });
        Ok(metadata)
    }

    pub async fn delete_backup(&self, backup_id: &str) -> Result<()> {
        self.backups.delete_backup(backup_id).await.map_err(|e| self.report(CoreErrorKind::BackupFailed, e))
    }

    // ── Plugins & sync ──────────────────────────────────────────────────────

    pub fn register_plugin(&self, plugin: Arc<dyn Plugin>) {
        info!(plugin = plugin.name(), "plugin registered");
        lock(&self.plugins).push(Arc::clone(&plugin));
        self.queue_hook(Hook::Register(plugin));
    }

    pub fn plugin_names(&self) -> Vec<String> {
        lock(&self.plugins).iter().map(|p| p.name().to_string()).collect()
    }

    /// Waits until every hook queued before this call has run. Must not be
    /// awaited from inside a hook.
    pub async fn settle(&self) {
        let (done, finished) = oneshot::channel();
        if self.hooks.send(Task::Settle(done)).is_ok() {
            let _ = finished.await;
        }
    }

    pub fn pending_sync(&self) -> Vec<SyncEvent> {
        lock(&self.sync_queue).clone()
    }

    /// Hands every queued sync event, in order, to each plugin's `on_sync`,
    /// then clears them. On a plugin error the queue is left untouched.
    pub async fn flush_sync(&self) -> Result<usize> {
        let events = lock(&self.sync_queue).clone();
        let plugins = lock(&self.plugins).clone();

        for event in &events {
            for plugin in &plugins {
                if let Err(err) = plugin.on_sync(self, event).await {
                    let err = CoreError::Plugin {
                        plugin: plugin.name().to_string(),
                        message: format!("{err:#}"),
                    };
                    return Err(self.report(CoreErrorKind::FlushSyncFailed, err));
                }
            }
        }

        {
            let mut queue = lock(&self.sync_queue);
            let flushed = events.len().min(queue.len());
            queue.drain(..flushed);
        }
        debug!(count = events.len(), "sync queue flushed");
        self.emit(CoreEvent::SyncFlushed { count: events.len() });
        Ok(events.len())
    }

    pub(crate) async fn run_hook(&self, hook: Hook) {
        let plugins = match &hook {
            Hook::Register(plugin) => vec![Arc::clone(plugin)],
            _ => lock(&self.plugins).clone(),
        };

        for plugin in plugins {
            let result = match &hook {
                Hook::Register(_) => plugin.on_register(self).await,
                Hook::Init => plugin.on_init(self).await,
                Hook::BoardCreated(board) => plugin.on_board_create(self, board).await,
                Hook::BoardUpdated(board) => plugin.on_board_update(self, board).await,
                Hook::BoardDeleted(board_id) => plugin.on_board_delete(self, *board_id).await,
                Hook::NoteCreated(board_id, note) => plugin.on_note_create(self, *board_id, note).await,
                Hook::NoteUpdated(board_id, note) => plugin.on_note_update(self, *board_id, note).await,
                Hook::NoteDeleted(board_id, note_id) => {
                    plugin.on_note_delete(self, *board_id, *note_id).await
                }
            };
            if let Err(err) = result {
                warn!(plugin = plugin.name(), hook = hook.name(), error = %format!("{err:#}"), "plugin hook failed");
            }
        }
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn emit(&self, event: CoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn report(&self, kind: CoreErrorKind, err: impl Into<CoreError>) -> CoreError {
        let err = err.into();
        error!(?kind, error = %err, "core operation failed");
        self.emit(CoreEvent::CoreError { kind, message: err.to_string() });
        err
    }

    fn reject_invalid(&self, board_id: BoardId, err: &ValidationError) {
        warn!(%board_id, error = %err, "dropping invalid board");
        self.emit(CoreEvent::CoreError {
            kind: CoreErrorKind::InvalidBoard,
            message: format!("board {board_id}: {err}"),
        });
    }

    /// Hands a stored change to plugins and subscribers. Callers record
    /// history first, so hooks always observe a settled history.
    fn publish(&self, applied: Applied) {
        self.queue_hook(applied.hook);
        self.emit(applied.event);
    }

    fn queue_hook(&self, hook: Hook) {
        let _ = self.hooks.send(Task::Run(hook));
    }

    fn record(&self, entry: HistoryEntry) {
        lock(&self.history).push(entry);
        self.announce_history();
    }

    fn announce_history(&self) {
        let (can_undo, can_redo) = {
            let history = lock(&self.history);
            (history.can_undo(), history.can_redo())
        };
        self.emit(CoreEvent::HistoryChanged { can_undo, can_redo });
    }

    fn enqueue_sync(&self, event: SyncEvent) {
        let pending = {
            let mut queue = lock(&self.sync_queue);
            queue.push(event);
            queue.len()
        };
        self.emit(CoreEvent::SyncQueued { pending });
    }

    fn read_board<R>(&self, board_id: BoardId, read: impl FnOnce(&Board) -> R) -> Result<R> {
        let found = lock(&self.boards).get(&board_id).map(read);
        found.ok_or_else(|| self.report(CoreErrorKind::NotFound, DomainError::not_found("Board", board_id)))
    }

    /// Edits a copy of the board, validates it and swaps it into the map.
    /// `None` from `edit` leaves the board untouched.
    fn stage<R>(
        &self,
        board_id: BoardId,
        edit: impl FnOnce(&mut Board) -> Option<R>,
    ) -> Result<Option<(Board, R)>> {
        let mut boards = lock(&self.boards);
        let Some(current) = boards.get(&board_id) else {
            drop(boards);
            return Err(self.report(CoreErrorKind::NotFound, DomainError::not_found("Board", board_id)));
        };

        let mut staged = current.clone();
        let Some(out) = edit(&mut staged) else {
            return Ok(None);
        };
        staged.touch();
        if let Err(err) = validate_board(&staged) {
            drop(boards);
            return Err(self.report(CoreErrorKind::ValidationFailed, err));
        }
        boards.insert(board_id, staged.clone());
        Ok(Some((staged, out)))
    }

    /// Puts `board` into the map and persists it.
    async fn store_board(&self, board: Board) -> Result<Applied> {
        let existed = lock(&self.boards).insert(board.id, board.clone()).is_some();
        self.persist(&board).await?;

        Ok(if existed {
            Applied { hook: Hook::BoardUpdated(board.clone()), event: CoreEvent::BoardUpdated { board } }
        } else {
            Applied { hook: Hook::BoardCreated(board.clone()), event: CoreEvent::BoardCreated { board } }
        })
    }

    /// Removes a board from memory and storage. A failed driver delete puts
    /// it back.
    async fn remove_board(&self, board_id: BoardId) -> Result<Option<(Board, Applied)>> {
        let removed = lock(&self.boards).remove(&board_id);
        let Some(board) = removed else {
            return Ok(None);
        };

        if let Err(err) = self.driver.delete(board_id).await {
            lock(&self.boards).entry(board_id).or_insert(board);
            return Err(self.report(CoreErrorKind::DeleteFailed, err));
        }

        lock(&self.unsynced).remove(&board_id);
        self.enqueue_sync(SyncEvent::Delete { board_id });
        let applied = Applied {
            hook: Hook::BoardDeleted(board_id),
            event: CoreEvent::BoardDeleted { board_id },
        };
        Ok(Some((board, applied)))
    }

    /// Inserts or replaces `note` on its board and persists the board.
    async fn store_note(&self, board_id: BoardId, note: Note) -> Result<Applied> {
        let staged = self.stage(board_id, |board| {
            Some(match board.note_position(note.id) {
                Some(i) => {
                    board.notes[i] = note.clone();
                    false
                }
                None => {
                    board.notes.push(note.clone());
                    true
                }
            })
        })?;
        let (snapshot, created) = staged.ok_or_else(|| DomainError::not_found("Note", note.id))?;
        self.persist(&snapshot).await?;

        Ok(if created {
            Applied {
                hook: Hook::NoteCreated(board_id, note.clone()),
                event: CoreEvent::NoteCreated { board_id, note },
            }
        } else {
            Applied {
                hook: Hook::NoteUpdated(board_id, note.clone()),
                event: CoreEvent::NoteUpdated { board_id, note },
            }
        })
    }

    async fn remove_note(&self, board_id: BoardId, note_id: NoteId) -> Result<Option<(Note, Applied)>> {
        let staged = self.stage(board_id, |board| {
            board.note_position(note_id).map(|i| board.notes.remove(i))
        })?;
        let Some((snapshot, note)) = staged else {
            return Ok(None);
        };
        self.persist(&snapshot).await?;

        let applied = Applied {
            hook: Hook::NoteDeleted(board_id, note_id),
            event: CoreEvent::NoteDeleted { board_id, note_id },
        };
        Ok(Some((note, applied)))
    }

    /// Saves with bounded retries and exponential backoff. A save that
    /// succeeds on the first attempt may schedule an automatic backup.
    async fn persist(&self, board: &Board) -> Result<()> {
        let attempts = self.config.persist_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            match self.driver.save(board).await {
                Ok(()) => break,
                Err(err) => {
                    warn!(board_id = %board.id, attempt = attempt + 1, error = %err, "persist attempt failed");
                    if attempt + 1 >= attempts {
                        lock(&self.unsynced).insert(board.id);
                        return Err(self.report(CoreErrorKind::PersistFailed, err));
                    }
                    sleep(self.config.backoff_base * 2u32.pow(attempt)).await;
                    attempt += 1;
                }
            }
        }

        debug!(board_id = %board.id, attempts = attempt + 1, "board persisted");
        lock(&self.unsynced).remove(&board.id);
        self.enqueue_sync(SyncEvent::Update { board: board.clone() });
        if attempt == 0 && self.auto_backup_due() {
            let _ = self.hooks.send(Task::AutoBackup);
        }
        Ok(())
    }

    fn auto_backup_due(&self) -> bool {
        let last = *lock(&self.last_auto_backup);
        if last.is_some_and(|at| at.elapsed() < self.config.auto_backup_interval) {
            return false;
        }
        !lock(&self.boards).is_empty()
    }

    /// Runs on the hook dispatcher. The interval restarts only after a
    /// backup succeeds, so a failure is retried on the next write.
    pub(crate) async fn run_auto_backup(&self) {
        if !self.auto_backup_due() {
            return;
        }

        let boards = self.all_boards();
        match self.backups.create_backup(&boards).await {
            Ok(metadata) => {
                *lock(&self.last_auto_backup) = Some(Instant::now());
                info!(backup_id = %metadata.id, "automatic backup created");
            }
            Err(err) => warn!(error = %err, "automatic backup failed"),
        }
    }
}
