//! The idempotency engine contract.
//!
//! The engine owns key derivation, storage, locking and expiry. The
//! interception layer only asks it two questions per request:
//!
//! 1. [`evaluate`](IdempotencyEngine::evaluate): is this a duplicate?
//!    `Ok(None)` means first-time, `Ok(Some(outcome))` means replay.
//! 2. [`complete`](IdempotencyEngine::complete): here is the response to
//!    cache for this request.
//!
//! Both calls receive the same [`IdempotencyRequest`].

use crate::error::EngineResult;
use crate::outcome::CachedOutcome;
use crate::request::IdempotencyRequest;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An engine shared by every request of a pipeline.
pub type SharedEngine = Arc<dyn IdempotencyEngine>;

/// Decides whether a request is new or a duplicate, and stores outcomes.
///
/// Implementations must guarantee at most one in-flight request per key and
/// report the losers with
/// [`FailureCode::RequestInProgress`](crate::FailureCode::RequestInProgress).
///
/// # Example
///
/// ```
/// use mnemosyne_core::{BoxFuture, CachedOutcome, EngineResult, IdempotencyEngine, IdempotencyRequest};
///
/// struct NeverCached;
///
/// impl IdempotencyEngine for NeverCached {
///     fn evaluate<'a>(
///         &'a self,
///         _request: &'a IdempotencyRequest,
///     ) -> BoxFuture<'a, EngineResult<Option<CachedOutcome>>> {
///         Box::pin(async { Ok(None) })
///     }
///
///     fn complete<'a>(
///         &'a self,
///         _request: &'a IdempotencyRequest,
///         _outcome: CachedOutcome,
///     ) -> BoxFuture<'a, EngineResult<()>> {
///         Box::pin(async { Ok(()) })
///     }
/// }
/// ```
pub trait IdempotencyEngine: Send + Sync + 'static {
    /// Looks up the request. Returns the cached outcome of a duplicate.
    fn evaluate<'a>(
        &'a self,
        request: &'a IdempotencyRequest,
    ) -> BoxFuture<'a, EngineResult<Option<CachedOutcome>>>;

    /// Stores the outcome of a first-time request.
    fn complete<'a>(
        &'a self,
        request: &'a IdempotencyRequest,
        outcome: CachedOutcome,
    ) -> BoxFuture<'a, EngineResult<()>>;
}
