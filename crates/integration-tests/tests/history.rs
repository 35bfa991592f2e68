//! Undo/redo through the engine against real storage.

use domains::{Board, BoardPatch, NotePatch, StorageDriver};
use integration_tests::{drain, memory_engine, names};
use services::CoreEvent;

#[tokio::test]
async fn undo_create_removes_board_everywhere() {
    let engine = memory_engine().await;
    let board = engine.create_board(BoardPatch::named("Sprint")).await.unwrap();

    assert!(engine.undo().await);
    assert!(engine.board(board.id).is_none());
    assert!(engine.driver().load().await.unwrap().is_empty());

    assert!(engine.redo().await);
    assert_eq!(engine.board(board.id), Some(board.clone()));
    assert_eq!(engine.driver().load().await.unwrap(), vec![board]);
}

#[tokio::test]
async fn undo_update_restores_previous_snapshot() {
    let engine = memory_engine().await;
    let board = engine.create_board(BoardPatch::named("Before")).await.unwrap();
    let after = engine.update_board(board.id, BoardPatch::named("After")).await.unwrap().unwrap();

    assert!(engine.undo().await);
    assert_eq!(engine.board(board.id), Some(board.clone()));
    assert!(engine.redo().await);
    assert_eq!(engine.board(board.id), Some(after));
}

#[tokio::test]
async fn undo_delete_brings_the_board_back() {
    let engine = memory_engine().await;
    let board = engine.create_board(BoardPatch::named("Doomed")).await.unwrap();
    engine.delete_board(board.id).await.unwrap();
    assert!(engine.all_boards().is_empty());

    assert!(engine.undo().await);
    assert_eq!(names(&engine.all_boards()), vec!["Doomed"]);
    assert_eq!(engine.driver().load().await.unwrap(), vec![board]);
}

#[tokio::test]
async fn new_change_discards_redo_tail() {
    let engine = memory_engine().await;
    engine.create_board(BoardPatch::named("A")).await.unwrap();
    engine.create_board(BoardPatch::named("B")).await.unwrap();

    assert!(engine.undo().await);
    assert!(engine.can_redo());
    engine.create_board(BoardPatch::named("C")).await.unwrap();

    assert!(!engine.can_redo());
    assert!(!engine.redo().await);
    assert_eq!(names(&engine.all_boards()), vec!["A", "C"]);
}

#[tokio::test]
async fn history_is_capped() {
    let engine = memory_engine().await;
    let board = engine.create_board(BoardPatch::named("v0")).await.unwrap();
    for i in 1..60 {
        engine.update_board(board.id, BoardPatch::named(format!("v{i}"))).await.unwrap();
    }

    let mut undone = 0;
    while engine.undo().await {
        undone += 1;
    }
    assert_eq!(undone, 50);
    // The oldest ten changes, including the creation, were evicted.
    assert_eq!(engine.board(board.id).unwrap().name, "v9");
}

#[tokio::test]
async fn history_changes_are_announced() {
    let engine = memory_engine().await;
    let mut rx = engine.subscribe();

    engine.create_board(BoardPatch::named("Watched")).await.unwrap();
    engine.undo().await;

    let flags: Vec<(bool, bool)> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            CoreEvent::HistoryChanged { can_undo, can_redo } => Some((can_undo, can_redo)),
            _ => None,
        })
        .collect();
    assert_eq!(flags, vec![(true, false), (false, true)]);
}

/// Board state with the board-level `updated_at` dropped; replaying a note
/// change touches its board.
fn settled(boards: Vec<Board>) -> Vec<Board> {
    boards.into_iter().map(|b| Board { updated_at: 0, ..b }).collect()
}

#[tokio::test]
async fn undoing_then_redoing_returns_to_the_same_state() {
    let engine = memory_engine().await;
    let board = engine.create_board(BoardPatch::named("v0")).await.unwrap();
    let note = engine.create_note(board.id, NotePatch::with_content("<p>first</p>")).await.unwrap();
    for i in 1..=5 {
        engine.update_board(board.id, BoardPatch::named(format!("v{i}"))).await.unwrap();
    }
    engine.update_note(board.id, note.id, NotePatch::with_content("<p>second</p>")).await.unwrap();
    let other = engine.create_board(BoardPatch::named("Other")).await.unwrap();
    engine.delete_board(other.id).await.unwrap();

    let expected = settled(engine.all_boards());
    // Ten changes were recorded above.
    for steps in 1..=10 {
        for _ in 0..steps {
            assert!(engine.undo().await);
        }
        for _ in 0..steps {
            assert!(engine.redo().await);
        }
        assert_eq!(settled(engine.all_boards()), expected, "after {steps} undo/redo steps");
        assert_eq!(settled(engine.driver().load().await.unwrap()), expected);
        assert!(!engine.can_redo());
    }
}
