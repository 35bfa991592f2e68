//! # History Manager
//!
//! Bounded, linear undo/redo log. Each entry carries the snapshots needed to
//! replay it in either direction, so the engine never has to re-derive state.

use std::collections::VecDeque;

use domains::{now_millis, Board, BoardId, Note, NoteId};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Board,
    Note,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Undo,
    Redo,
}

/// State captured around one mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<T> {
    Created(T),
    Updated { before: T, after: T },
    Deleted(T),
}

/// What replaying a transition in some direction asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Replay<'a, T> {
    Put(&'a T),
    Remove(&'a T),
}

impl<T> Transition<T> {
    pub fn action(&self) -> Action {
        match self {
            Transition::Created(_) => Action::Create,
            Transition::Updated { .. } => Action::Update,
            Transition::Deleted(_) => Action::Delete,
        }
    }

    pub fn replay(&self, direction: Direction) -> Replay<'_, T> {
        match (self, direction) {
            (Transition::Created(item), Direction::Undo) => Replay::Remove(item),
            (Transition::Created(item), Direction::Redo) => Replay::Put(item),
            (Transition::Updated { before, .. }, Direction::Undo) => Replay::Put(before),
            (Transition::Updated { after, .. }, Direction::Redo) => Replay::Put(after),
            (Transition::Deleted(item), Direction::Undo) => Replay::Put(item),
            (Transition::Deleted(item), Direction::Redo) => Replay::Remove(item),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Board(Transition<Box<Board>>),
    Note { board_id: BoardId, transition: Transition<Note> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub change: Change,
    pub timestamp: i64,
}

impl HistoryEntry {
    fn new(change: Change) -> Self {
        Self { change, timestamp: now_millis() }
    }

    pub fn board(transition: Transition<Box<Board>>) -> Self {
        Self::new(Change::Board(transition))
    }

    pub fn note(board_id: BoardId, transition: Transition<Note>) -> Self {
        Self::new(Change::Note { board_id, transition })
    }

    pub fn kind(&self) -> TargetKind {
        match self.change {
            Change::Board(_) => TargetKind::Board,
            Change::Note { .. } => TargetKind::Note,
        }
    }

    pub fn action(&self) -> Action {
        match &self.change {
            Change::Board(t) => t.action(),
            Change::Note { transition, .. } => transition.action(),
        }
    }

    pub fn board_id(&self) -> BoardId {
        match &self.change {
            Change::Board(t) => match t {
                Transition::Created(b) | Transition::Deleted(b) => b.id,
                Transition::Updated { after, .. } => after.id,
            },
            Change::Note { board_id, .. } => *board_id,
        }
    }

    pub fn note_id(&self) -> Option<NoteId> {
        match &self.change {
            Change::Board(_) => None,
            Change::Note { transition, .. } => Some(match transition {
                Transition::Created(n) | Transition::Deleted(n) => n.id,
                Transition::Updated { after, .. } => after.id,
            }),
        }
    }
}

/// Entries up to and including `cursor` can be undone; entries after it can
/// be redone. Pushing discards the redo tail.
#[derive(Debug)]
pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    cursor: Option<usize>,
    limit: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryManager {
    pub fn new(limit: usize) -> Self {
        Self { entries: VecDeque::new(), cursor: None, limit: limit.max(1) }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.truncate(self.next_index());
        self.entries.push_back(entry);
        if self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.cursor = Some(self.entries.len() - 1);
    }

    /// Returns the entry to revert and steps the cursor back.
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        let cursor = self.cursor?;
        let entry = self.entries.get(cursor).cloned();
        self.cursor = cursor.checked_sub(1);
        entry
    }

    /// Steps the cursor forward and returns the entry to re-apply.
    pub fn redo(&mut self) -> Option<HistoryEntry> {
        let next = self.next_index();
        let entry = self.entries.get(next).cloned()?;
        self.cursor = Some(next);
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.next_index() < self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    /// Index of the most recent applied entry, `None` when nothing can be undone.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn next_index(&self) -> usize {
        self.cursor.map_or(0, |c| c + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(name: &str) -> HistoryEntry {
        HistoryEntry::board(Transition::Created(Box::new(Board::new(name))))
    }

    fn name_of(entry: &HistoryEntry) -> &str {
        match &entry.change {
            Change::Board(Transition::Created(b)) => &b.name,
            _ => unreachable!(),
        }
    }

    #[test]
    fn empty_history_has_nothing_to_do() {
        let mut history = HistoryManager::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert_eq!(history.cursor(), None);
    }

    #[test]
    fn undo_then_redo_walks_the_same_entries() {
        let mut history = HistoryManager::default();
        history.push(created("a"));
        history.push(created("b"));

        assert_eq!(name_of(&history.undo().unwrap()), "b");
        assert_eq!(name_of(&history.undo().unwrap()), "a");
        assert!(!history.can_undo());
        assert!(history.can_redo());

        assert_eq!(name_of(&history.redo().unwrap()), "a");
        assert_eq!(name_of(&history.redo().unwrap()), "b");
        assert!(!history.can_redo());
    }

    #[test]
    fn push_discards_the_redo_tail() {
        let mut history = HistoryManager::default();
        history.push(created("a"));
        history.push(created("b"));
        history.undo();
        history.push(created("c"));

        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert_eq!(name_of(&history.undo().unwrap()), "c");
        assert_eq!(name_of(&history.undo().unwrap()), "a");
    }

    #[test]
    fn cap_evicts_oldest_entries() {
        let mut history = HistoryManager::default();
        for i in 0..60 {
            history.push(created(&format!("b{i}")));
        }
        assert_eq!(history.len(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history.cursor(), Some(49));

        let mut undone = 0;
        let mut last = None;
        while let Some(entry) = history.undo() {
            undone += 1;
            last = Some(name_of(&entry).to_string());
        }
        assert_eq!(undone, 50);
        assert_eq!(last.as_deref(), Some("b10"));
    }

    #[test]
    fn clear_resets_everything() {
        let mut history = HistoryManager::new(5);
        history.push(created("a"));
        history.clear();
        assert!(history.is_empty());
        assert!(!history.can_undo());
    }

    #[test]
    fn transitions_replay_the_right_snapshot() {
        let before = Note::new();
        let mut after = before.clone();
        after.content_html = "changed".into();
        let update = Transition::Updated { before: before.clone(), after: after.clone() };
        assert_eq!(update.replay(Direction::Undo), Replay::Put(&before));
        assert_eq!(update.replay(Direction::Redo), Replay::Put(&after));

        let create = Transition::Created(before.clone());
        assert_eq!(create.replay(Direction::Undo), Replay::Remove(&before));
        let delete = Transition::Deleted(before.clone());
        assert_eq!(delete.replay(Direction::Undo), Replay::Put(&before));
        assert_eq!(delete.replay(Direction::Redo), Replay::Remove(&before));
    }

    #[test]
    fn entry_accessors() {
        let board_id = uuid::Uuid::new_v4();
        let note = Note::new();
        let entry = HistoryEntry::note(board_id, Transition::Deleted(note.clone()));
        assert_eq!(entry.kind(), TargetKind::Note);
        assert_eq!(entry.action(), Action::Delete);
        assert_eq!(entry.board_id(), board_id);
        assert_eq!(entry.note_id(), Some(note.id));
    }
}
