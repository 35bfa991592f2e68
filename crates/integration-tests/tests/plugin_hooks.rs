//! Plugin hooks observe mutations only after they are fully recorded.

use std::sync::Arc;

use async_trait::async_trait;
use domains::{Board, BoardPatch};
use integration_tests::memory_engine;
use services::{Engine, Plugin};

const ORIGINAL: &str = "orig";
const RENAMED: &str = "renamed";

/// Renames every freshly created board, itself a recorded change.
struct Renamer;

#[async_trait]
impl Plugin for Renamer {
    fn name(&self) -> &str {
        "renamer"
    }

    async fn on_board_create(&self, engine: &Engine, board: &Board) -> anyhow::Result<()> {
        engine.update_board(board.id, BoardPatch::named(RENAMED)).await?;
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hook_changes_are_recorded_after_the_change_that_triggered_them() {
    let engine = memory_engine().await;
    engine.register_plugin(Arc::new(Renamer));

    for round in 0..200 {
        let board = engine.create_board(BoardPatch::named(ORIGINAL)).await.unwrap();
        engine.settle().await;
        assert_eq!(engine.board(board.id).unwrap().name, RENAMED, "round {round}");

        // Undo reverts the hook's rename, not the creation.
        assert!(engine.undo().await);
        assert_eq!(engine.board(board.id).map(|b| b.name).as_deref(), Some(ORIGINAL), "round {round}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn undoing_twice_removes_the_hooked_board() {
    let engine = memory_engine().await;
    engine.register_plugin(Arc::new(Renamer));

    let board = engine.create_board(BoardPatch::named(ORIGINAL)).await.unwrap();
    engine.settle().await;

    assert!(engine.undo().await);
    assert!(engine.undo().await);
    assert!(engine.board(board.id).is_none());
    assert!(!engine.can_undo());
}
