//! Test engines for Mnemosyne development and testing.
//!
//! These engines implement [`IdempotencyEngine`] without any storage. They
//! answer `evaluate` from a script and record every call so tests can assert
//! on what the interception layer sent.
//!
//! # Example
//!
//! ```
//! use mnemosyne_core::fixtures::ScriptedEngine;
//! use mnemosyne_core::CachedOutcome;
//! use serde_json::json;
//!
//! // First call is new, second is a duplicate.
//! let engine = ScriptedEngine::new()
//!     .then_new()
//!     .then_replay(CachedOutcome::success(200, json!({"ok": true})));
//!
//! assert_eq!(engine.pending_decisions(), 2);
//! ```

use crate::engine::{BoxFuture, IdempotencyEngine};
use crate::error::{EngineError, EngineResult, FailureCode};
use crate::outcome::CachedOutcome;
use crate::request::IdempotencyRequest;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A recorded `complete` call.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The request snapshot passed to `complete`.
    pub request: IdempotencyRequest,
    /// The outcome passed to `complete`.
    pub outcome: CachedOutcome,
}

/// An engine that replays a scripted sequence of decisions.
///
/// Each `evaluate` pops the next scripted result; once the script is
/// exhausted every request is treated as first-time.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    decisions: Mutex<VecDeque<EngineResult<Option<CachedOutcome>>>>,
    evaluated: Mutex<Vec<IdempotencyRequest>>,
    completions: Mutex<Vec<Completion>>,
    fail_completions: AtomicBool,
    completed: Notify,
}

impl ScriptedEngine {
    /// Creates an engine with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a first-time decision.
    #[must_use]
    pub fn then_new(self) -> Self {
        self.decisions.lock().push_back(Ok(None));
        self
    }

    /// Scripts a duplicate decision replaying `outcome`.
    #[must_use]
    pub fn then_replay(self, outcome: CachedOutcome) -> Self {
        self.decisions.lock().push_back(Ok(Some(outcome)));
        self
    }

    /// Scripts a recognized failure with the given code.
    #[must_use]
    pub fn then_fail(self, code: FailureCode) -> Self {
        let message = format!("scripted failure {code}");
        self.decisions
            .lock()
            .push_back(Err(EngineError::idempotency(code, message)));
        self
    }

    /// Scripts an unrecognized failure.
    #[must_use]
    pub fn then_error(self, message: &'static str) -> Self {
        self.decisions.lock().push_back(Err(EngineError::other(message)));
        self
    }

    /// Makes every `complete` call fail after it is recorded.
    #[must_use]
    pub fn failing_completions(self) -> Self {
        self.fail_completions.store(true, Ordering::SeqCst);
        self
    }

    /// Returns the number of scripted decisions not yet consumed.
    #[must_use]
    pub fn pending_decisions(&self) -> usize {
        self.decisions.lock().len()
    }

    /// Returns every request passed to `evaluate`, in order.
    #[must_use]
    pub fn evaluations(&self) -> Vec<IdempotencyRequest> {
        self.evaluated.lock().clone()
    }

    /// Returns every recorded `complete` call, in order.
    #[must_use]
    pub fn completions(&self) -> Vec<Completion> {
        self.completions.lock().clone()
    }

    /// Waits until at least `count` completions were recorded.
    pub async fn wait_for_completions(&self, count: usize) -> Vec<Completion> {
        loop {
            let notified = self.completed.notified();
            {
                let completions = self.completions.lock();
                if completions.len() >= count {
                    return completions.clone();
                }
            }
            notified.await;
        }
    }
}

impl IdempotencyEngine for ScriptedEngine {
    fn evaluate<'a>(
        &'a self,
        request: &'a IdempotencyRequest,
    ) -> BoxFuture<'a, EngineResult<Option<CachedOutcome>>> {
        Box::pin(async move {
            self.evaluated.lock().push(request.clone());
            self.decisions.lock().pop_front().unwrap_or(Ok(None))
        })
    }

    fn complete<'a>(
        &'a self,
        request: &'a IdempotencyRequest,
        outcome: CachedOutcome,
    ) -> BoxFuture<'a, EngineResult<()>> {
        Box::pin(async move {
            self.completions.lock().push(Completion {
                request: request.clone(),
                outcome,
            });
            self.completed.notify_waiters();

            if self.fail_completions.load(Ordering::SeqCst) {
                Err(EngineError::other("scripted completion failure"))
            } else {
                Ok(())
            }
        })
    }
}

/// An engine whose `evaluate` never resolves.
///
/// Useful for exercising evaluate timeouts.
#[derive(Debug, Default, Clone, Copy)]
pub struct StalledEngine;

impl IdempotencyEngine for StalledEngine {
    fn evaluate<'a>(
        &'a self,
        _request: &'a IdempotencyRequest,
    ) -> BoxFuture<'a, EngineResult<Option<CachedOutcome>>> {
        Box::pin(std::future::pending())
    }

    fn complete<'a>(
        &'a self,
        _request: &'a IdempotencyRequest,
        _outcome: CachedOutcome,
    ) -> BoxFuture<'a, EngineResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
