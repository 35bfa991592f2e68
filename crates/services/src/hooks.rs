//! Deferred plugin hook dispatch.
//!
//! Mutations push a [`Hook`] onto an unbounded channel; a single background
//! task drains it in order and runs every plugin for each hook. Automatic
//! backups run on the same task, off the write path.

use std::sync::{Arc, Weak};

use domains::{Board, BoardId, Note, NoteId};
use tokio::sync::{mpsc, oneshot};

use crate::engine::Engine;
use crate::plugin::Plugin;

pub(crate) enum Hook {
    /// Only the newly registered plugin is called.
    Register(Arc<dyn Plugin>),
    Init,
    BoardCreated(Board),
    BoardUpdated(Board),
    BoardDeleted(BoardId),
    NoteCreated(BoardId, Note),
    NoteUpdated(BoardId, Note),
    NoteDeleted(BoardId, NoteId),
}

impl Hook {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Hook::Register(_) => "on_register",
            Hook::Init => "on_init",
            Hook::BoardCreated(_) => "on_board_create",
            Hook::BoardUpdated(_) => "on_board_update",
            Hook::BoardDeleted(_) => "on_board_delete",
            Hook::NoteCreated(..) => "on_note_create",
            Hook::NoteUpdated(..) => "on_note_update",
            Hook::NoteDeleted(..) => "on_note_delete",
        }
    }
}

pub(crate) enum Task {
    Run(Hook),
    AutoBackup,
    /// Completes once every task queued before it has run.
    Settle(oneshot::Sender<()>),
}

/// Spawns the dispatcher. It stops once the engine is dropped.
pub(crate) fn spawn_dispatcher(engine: Weak<Engine>) -> mpsc::UnboundedSender<Task> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
    tokio::spawn(async move {
        while let Some(task) = rx.recv().await {
            match task {
                Task::Settle(done) => {
                    let _ = done.send(());
                }
                Task::Run(hook) => {
                    let Some(engine) = engine.upgrade() else {
                        break;
                    };
                    engine.run_hook(hook).await;
                }
                Task::AutoBackup => {
                    let Some(engine) = engine.upgrade() else {
                        break;
                    };
                    engine.run_auto_backup().await;
                }
            }
        }
    });
    tx
}
