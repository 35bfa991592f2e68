//! FIFO gate for engine transactions.
//!
//! One transaction runs at a time; later callers wait in arrival order. When
//! the running transaction fails, every caller already waiting is woken with
//! `TransactionAborted` instead of running.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::error::{CoreError, Result};

#[derive(Debug, Default)]
struct Gate {
    running: bool,
    waiters: VecDeque<oneshot::Sender<()>>,
}

#[derive(Debug, Default)]
pub(crate) struct TransactionQueue {
    gate: Mutex<Gate>,
}

/// Held while a transaction runs. Dropping it hands the turn to the next
/// waiter, or aborts all of them if the transaction was marked failed.
#[derive(Debug)]
pub(crate) struct Turn<'a> {
    queue: &'a TransactionQueue,
    failed: bool,
}

impl Turn<'_> {
    pub(crate) fn fail(&mut self) {
        self.failed = true;
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        self.queue.release(self.failed);
    }
}

/// A caller still waiting for its turn. Dropping it after the turn was
/// granted but before it was claimed passes the turn on.
struct Pending<'a> {
    queue: &'a TransactionQueue,
    turn: oneshot::Receiver<()>,
    claimed: bool,
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if self.claimed {
            return;
        }
        let mut gate = self.queue.lock();
        self.turn.close();
        if self.turn.try_recv().is_ok() {
            TransactionQueue::hand_over(&mut gate, false);
        }
    }
}

impl TransactionQueue {
    fn lock(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) async fn acquire(&self) -> Result<Turn<'_>> {
        let waiting = {
            let mut gate = self.lock();
            if gate.running {
                let (tx, rx) = oneshot::channel();
                gate.waiters.push_back(tx);
                Some(rx)
            } else {
                gate.running = true;
                None
            }
        };

        if let Some(turn) = waiting {
            let mut pending = Pending { queue: self, turn, claimed: false };
            // A dropped sender means the queue was aborted.
            (&mut pending.turn).await.map_err(|_| CoreError::TransactionAborted)?;
            pending.claimed = true;
        }
        Ok(Turn { queue: self, failed: false })
    }

    fn release(&self, failed: bool) {
        Self::hand_over(&mut self.lock(), failed);
    }

    fn hand_over(gate: &mut Gate, failed: bool) {
        if failed {
            gate.waiters.clear();
            gate.running = false;
            return;
        }
        // Skip waiters that gave up; `running` stays set while the turn passes.
        while let Some(next) = gate.waiters.pop_front() {
            if next.send(()).is_ok() {
                return;
            }
        }
        gate.running = false;
    }

    #[cfg(test)]
    fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }
}
