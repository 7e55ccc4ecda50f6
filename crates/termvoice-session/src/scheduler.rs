//! Cancellable one-shot deferred actions.
//!
//! `DelayedTask` runs a future after a delay on the tokio runtime and aborts
//! it when cancelled or dropped. `CommitScheduler` builds the silence
//! auto-commit on top of it: expiry is reported as a `SessionSignal` so the
//! commit itself runs inside the controller, never on the timer task.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A future scheduled to run once after a delay.
///
/// Cancelling (or dropping) the task aborts it, which drops everything the
/// future owns.
#[derive(Debug)]
pub struct DelayedTask {
    handle: Option<JoinHandle<()>>,
}

impl DelayedTask {
    /// Spawn `task` to run after `delay`. Must be called within a tokio runtime.
    pub fn spawn<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Abort the task if it has not run yet. No-op otherwise.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether the task is still waiting or running.
    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Timer expiries delivered back to the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    /// The silence timeout elapsed for the given schedule generation.
    SilenceElapsed { session_id: Uuid, generation: u64 },
}

/// The silence auto-commit timer of one session.
///
/// At most one expiry is pending. Every `schedule` and `cancel` bumps the
/// generation, so an expiry that was already queued when it got replaced or
/// cancelled is rejected by [`CommitScheduler::accept`].
#[derive(Debug)]
pub struct CommitScheduler {
    session_id: Uuid,
    delay: Duration,
    signals: mpsc::UnboundedSender<SessionSignal>,
    generation: u64,
    pending: Option<DelayedTask>,
}

impl CommitScheduler {
    pub fn new(
        session_id: Uuid,
        delay: Duration,
        signals: mpsc::UnboundedSender<SessionSignal>,
    ) -> Self {
        Self {
            session_id,
            delay,
            signals,
            generation: 0,
            pending: None,
        }
    }

    /// (Re)start the timer, replacing any pending expiry.
    pub fn schedule(&mut self) {
        self.cancel();
        let signal = SessionSignal::SilenceElapsed {
            session_id: self.session_id,
            generation: self.generation,
        };
        let signals = self.signals.clone();
        self.pending = Some(DelayedTask::spawn(self.delay, async move {
            // The receiver only goes away with the controller.
            let _ = signals.send(signal);
        }));
        tracing::trace!(
            session_id = %self.session_id,
            generation = self.generation,
            delay_ms = self.delay.as_millis() as u64,
            "Silence timer scheduled"
        );
    }

    /// Cancel the pending expiry. No-op when none is pending.
    pub fn cancel(&mut self) {
        self.generation += 1;
        if let Some(mut task) = self.pending.take() {
            task.cancel();
            tracing::trace!(session_id = %self.session_id, "Silence timer cancelled");
        }
    }

    /// Whether an expiry is outstanding (waiting, or fired but not yet accepted).
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Claim an expiry. Returns `true` exactly once per schedule, and only
    /// for the current generation.
    pub fn accept(&mut self, generation: u64) -> bool {
        if self.pending.is_some() && generation == self.generation {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
