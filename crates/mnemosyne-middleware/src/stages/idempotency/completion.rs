//! Background dispatch of completion calls.
//!
//! Caching a first-time response must not delay it. The dispatcher spawns
//! each `complete` call onto its own Tokio task; failures are logged and
//! dropped, never surfaced to the client.

use mnemosyne_core::{CachedOutcome, IdempotencyRequest, SharedEngine};
use mnemosyne_telemetry::metrics::{record_completion, InFlightGuard};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Spawns `complete` calls and tracks how many are still running.
///
/// Cloning is cheap; clones share the engine and the in-flight counter.
#[derive(Clone)]
pub struct CompletionDispatcher {
    engine: SharedEngine,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl CompletionDispatcher {
    /// Creates a dispatcher for `engine`.
    #[must_use]
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Spawns `engine.complete(request, outcome)` on the current runtime.
    ///
    /// The task runs inside the caller's current tracing span. The returned
    /// handle may be dropped; the task keeps running.
    pub fn dispatch(
        &self,
        request: Arc<IdempotencyRequest>,
        outcome: CachedOutcome,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        let tracker = Tracker::enter(Arc::clone(&self.in_flight), Arc::clone(&self.idle));

        let task = async move {
            let _tracker = tracker;
            let _gauge = InFlightGuard::new();
            let status = outcome.status_code();

            match engine.complete(&request, outcome).await {
                Ok(()) => {
                    record_completion(true);
                    tracing::debug!(status = ?status, "cached response stored");
                }
                Err(error) => {
                    record_completion(false);
                    tracing::warn!(
                        error = %error,
                        status = ?status,
                        "failed to store cached response"
                    );
                }
            }
        };

        tokio::spawn(task.in_current_span())
    }

    /// Returns the number of completion calls still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Waits until no completion call is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for CompletionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionDispatcher")
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// Counts one task as in flight until dropped.
struct Tracker {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Tracker {
    fn enter(in_flight: Arc<AtomicUsize>, idle: Arc<Notify>) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self { in_flight, idle }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}
