//! Idempotency interception middleware.
//!
//! Consults an [`IdempotencyEngine`](mnemosyne_core::IdempotencyEngine) for
//! every request and acts on its decision:
//!
//! | Decision                | Action                                                    |
//! |-------------------------|-----------------------------------------------------------|
//! | none (first-time)       | continue the chain, capture the response for the engine   |
//! | cached outcome          | replay status, headers and body; or forward cached error  |
//! | `REQUEST_IN_PROGRESS`   | `retry-after: 1`, mapped status, forward the failure      |
//! | any other failure       | mapped status (500 if unmapped), forward the failure      |
//!
//! Only `evaluate` is awaited. The completion call for first-time requests
//! runs on a background task (see [`CompletionDispatcher`]).
//!
//! # Example
//!
//! ```
//! use mnemosyne_core::fixtures::ScriptedEngine;
//! use mnemosyne_middleware::stages::IdempotencyMiddleware;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let middleware = IdempotencyMiddleware::new(Arc::new(ScriptedEngine::new()))
//!     .with_evaluate_timeout(Duration::from_secs(2));
//!
//! assert_eq!(middleware.replay_header().as_str(), "idempotent-replayed");
//! ```

mod capture;
mod completion;
mod normalize;
mod replicate;

pub use capture::CaptureSink;
pub use completion::CompletionDispatcher;
pub use normalize::normalize;
pub use replicate::replicate_headers;

use crate::context::MiddlewareContext;
use crate::error::PipelineError;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::sink::{encode_value, ResponseSink, ResponseWriter};
use crate::stages::body_parser::ParsedBody;
use crate::types::{body_bytes, Request, Response};
use bytes::Bytes;
use http::header::RETRY_AFTER;
use http::{HeaderName, HeaderValue, StatusCode};
use mnemosyne_core::conventions::REPLAYED_HEADER;
use mnemosyne_core::{CachedOutcome, EngineError, EngineResult, IdempotencyRequest, SharedEngine};
use mnemosyne_telemetry::metrics::{record_decision, Decision};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Middleware that enforces the idempotency-key protocol.
pub struct IdempotencyMiddleware {
    engine: SharedEngine,
    dispatcher: CompletionDispatcher,
    replay_header: HeaderName,
    evaluate_timeout: Option<Duration>,
}

impl IdempotencyMiddleware {
    /// Creates the middleware around a shared engine.
    #[must_use]
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            dispatcher: CompletionDispatcher::new(Arc::clone(&engine)),
            engine,
            replay_header: HeaderName::from_static(REPLAYED_HEADER),
            evaluate_timeout: None,
        }
    }

    /// Sets the header that marks replayed responses.
    #[must_use]
    pub fn with_replay_header(mut self, name: HeaderName) -> Self {
        self.replay_header = name;
        self
    }

    /// Bounds how long `evaluate` may take before the request fails with 500.
    #[must_use]
    pub fn with_evaluate_timeout(mut self, timeout: Duration) -> Self {
        self.evaluate_timeout = Some(timeout);
        self
    }

    /// Returns the replay marker header name.
    #[must_use]
    pub fn replay_header(&self) -> &HeaderName {
        &self.replay_header
    }

    /// Returns the evaluate timeout, if any.
    #[must_use]
    pub fn evaluate_timeout(&self) -> Option<Duration> {
        self.evaluate_timeout
    }

    /// Returns the dispatcher running completion calls.
    ///
    /// Hosts can use it to drain pending cache writes on shutdown.
    #[must_use]
    pub fn dispatcher(&self) -> &CompletionDispatcher {
        &self.dispatcher
    }

    async fn evaluate(&self, request: &IdempotencyRequest) -> EngineResult<Option<CachedOutcome>> {
        match self.evaluate_timeout {
            None => self.engine.evaluate(request).await,
            Some(limit) => tokio::time::timeout(limit, self.engine.evaluate(request))
                .await
                .unwrap_or_else(|_| {
                    Err(EngineError::other(format!(
                        "evaluate timed out after {}ms",
                        limit.as_millis()
                    )))
                }),
        }
    }

    /// Sends the downstream response through a [`CaptureSink`].
    async fn capture(&self, request: Arc<IdempotencyRequest>, response: Response) -> Response {
        let (parts, body) = response.into_parts();
        let payload = body_bytes(body).await;

        CaptureSink::new(
            ResponseWriter::from_parts(parts),
            request,
            self.dispatcher.clone(),
        )
        .send(payload)
    }

    fn replay(&self, ctx: &MiddlewareContext, outcome: CachedOutcome, next: Next<'_>) -> Response {
        let mut sink = ResponseWriter::new();

        if let Some(code) = outcome.status_code() {
            match StatusCode::from_u16(code) {
                Ok(status) => sink.set_status(status),
                Err(_) => tracing::warn!(status = code, "ignoring invalid cached status code"),
            }
        }

        replicate_headers(&mut sink, outcome.headers());
        sink.set_header(self.replay_header.clone(), HeaderValue::from_static("true"));

        tracing::debug!(status = sink.status().as_u16(), "replaying cached response");

        match (outcome.body, outcome.error) {
            (Some(body), _) => {
                let payload = encode_value(&mut sink, body);
                sink.send(payload)
            }
            (None, Some(error)) => next.fail(ctx, sink, PipelineError::Replayed { payload: error }),
            (None, None) => sink.send(Bytes::new()),
        }
    }

    fn reject(&self, ctx: &MiddlewareContext, error: EngineError, next: Next<'_>) -> Response {
        let mut sink = ResponseWriter::new();

        if let Some(secs) = error.retry_after_secs() {
            sink.set_header(RETRY_AFTER, HeaderValue::from(secs));
        }
        sink.set_status(error.status_code());

        tracing::warn!(
            error = %error,
            recognized = error.is_recognized(),
            status = error.status_code().as_u16(),
            "idempotency check failed"
        );

        next.fail(ctx, sink, PipelineError::Engine(error))
    }
}

impl fmt::Debug for IdempotencyMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdempotencyMiddleware")
            .field("replay_header", &self.replay_header)
            .field("evaluate_timeout", &self.evaluate_timeout)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl Middleware for IdempotencyMiddleware {
    fn name(&self) -> &'static str {
        "idempotency"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        let span = tracing::debug_span!(
            "idempotency",
            request_id = %ctx.request_id(),
            http.method = %request.method(),
            http.path = %request.uri().path(),
        );

        Box::pin(
            async move {
                let (parts, body) = request.into_parts();
                let parsed = ctx
                    .get_extension::<ParsedBody>()
                    .map_or(Value::Null, |parsed| parsed.0.clone());
                let snapshot = Arc::new(IdempotencyRequest::from_parts(&parts, parsed));
                let request = Request::from_parts(parts, body);

                match self.evaluate(&snapshot).await {
                    Ok(None) => {
                        record_decision(Decision::New);
                        tracing::debug!("first-time request; capturing response");
                        let response = next.run(ctx, request).await;
                        self.capture(snapshot, response).await
                    }
                    Ok(Some(outcome)) => {
                        record_decision(Decision::Replayed);
                        self.replay(ctx, outcome, next)
                    }
                    Err(error) => {
                        record_decision(Decision::Failed);
                        self.reject(ctx, error, next)
                    }
                }
            }
            .instrument(span),
        )
    }
}
