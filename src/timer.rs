//! One-shot cancellable timers for the arbiter.
//!
//! A [`ScheduledTimer`] is a spawned task that sleeps for the requested
//! delay and then posts a message back into the owner's mailbox. Firing
//! and cancellation must be mutually exclusive side effects: cancellation
//! aborts the sleeper, and because an already-fired message may still sit
//! in the mailbox, every timer carries a generation number the owner
//! compares against its current one before acting on a fire. A stale
//! generation means the timer was cancelled (or superseded) after firing
//! and the message is ignored.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Handle to an armed one-shot timer.
#[derive(Debug)]
pub struct ScheduledTimer {
    task: JoinHandle<()>,
}

impl ScheduledTimer {
    /// Arm a timer that sends `message` on `tx` after `delay`.
    ///
    /// The caller stamps `message` with the generation it records for this
    /// timer and must discard fires whose generation no longer matches.
    pub fn arm<M: Send + 'static>(delay: Duration, tx: UnboundedSender<M>, message: M) -> Self {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver may be gone during shutdown.
            let _ = tx.send(message);
        });
        Self { task }
    }

    /// Cancel the timer. Safe to call after the timer has fired; the
    /// generation check on the owner's side suppresses the stale message.
    pub fn cancel(self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
