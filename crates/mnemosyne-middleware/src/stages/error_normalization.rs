//! Error normalization.
//!
//! The default [`ErrorHandler`] of every pipeline. Errors forwarded through
//! [`Next::fail`](crate::Next::fail) end up here and are converted to a
//! consistent response.
//!
//! # Status Resolution
//!
//! A stage may set an error status before forwarding (the idempotency stage
//! does this for mapped engine failures). That status is kept. Otherwise the
//! error's own status is used.
//!
//! # Error Envelope Format
//!
//! All errors except replayed ones are converted to this format:
//!
//! ```json
//! {
//!   "error": {
//!     "code": "ERROR_CODE",
//!     "message": "Human-readable error message",
//!     "request_id": "uuid-v7-request-id"
//!   }
//! }
//! ```
//!
//! A replayed error is a cached payload from an earlier attempt; it is written
//! back verbatim.
//!
//! # Example
//!
//! ```rust
//! use mnemosyne_middleware::stages::ErrorNormalizationMiddleware;
//!
//! // Default configuration
//! let error_norm = ErrorNormalizationMiddleware::new();
//!
//! // With verbose internal errors (development only)
//! let error_norm = ErrorNormalizationMiddleware::new()
//!     .expose_internal_errors(true);
//! ```

use crate::context::MiddlewareContext;
use crate::error::PipelineError;
use crate::middleware::ErrorHandler;
use crate::sink::{encode_value, ResponseSink, ResponseWriter};
use crate::types::Response;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use std::borrow::Cow;

/// Error handler that renders forwarded errors as a standard envelope.
#[derive(Debug, Clone)]
pub struct ErrorNormalizationMiddleware {
    /// Whether to expose internal error details (development mode).
    expose_internal_errors: bool,
    /// Message sent for server errors when details are hidden.
    internal_error_message: Cow<'static, str>,
}

impl Default for ErrorNormalizationMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorNormalizationMiddleware {
    /// Creates a new error normalizer with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            expose_internal_errors: false,
            internal_error_message: Cow::Borrowed("An internal error occurred"),
        }
    }

    /// Sets whether to expose internal error details.
    ///
    /// **Warning**: Only enable this in development environments.
    #[must_use]
    pub fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.expose_internal_errors = expose;
        self
    }

    /// Sets the default message for internal errors.
    #[must_use]
    pub fn internal_error_message(mut self, message: impl Into<String>) -> Self {
        self.internal_error_message = Cow::Owned(message.into());
        self
    }

    /// Renders `error` on `sink`.
    pub fn respond(
        &self,
        ctx: &MiddlewareContext,
        mut sink: ResponseWriter,
        error: PipelineError,
    ) -> Response {
        let status = resolve_status(sink.status(), &error);
        sink.set_status(status);

        if status.is_server_error() {
            tracing::error!(
                request_id = %ctx.request_id(),
                status = status.as_u16(),
                error = %error,
                "request failed"
            );
        } else {
            tracing::debug!(
                request_id = %ctx.request_id(),
                status = status.as_u16(),
                error = %error,
                "request rejected"
            );
        }

        if let PipelineError::Replayed { payload } = error {
            let bytes = encode_value(&mut sink, payload);
            return sink.send(bytes);
        }

        let message = if status.is_server_error() && !self.expose_internal_errors {
            self.internal_error_message.to_string()
        } else {
            error.to_string()
        };

        let envelope = serde_json::json!({
            "error": {
                "code": error.code(),
                "message": message,
                "request_id": ctx.request_id().to_string()
            }
        });

        sink.set_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        sink.send(Bytes::from(envelope.to_string()))
    }
}

impl ErrorHandler for ErrorNormalizationMiddleware {
    fn handle(
        &self,
        ctx: &MiddlewareContext,
        sink: ResponseWriter,
        error: PipelineError,
    ) -> Response {
        self.respond(ctx, sink, error)
    }
}

/// Keeps an error status already set on the sink, else uses the error's own.
fn resolve_status(current: StatusCode, error: &PipelineError) -> StatusCode {
    if current.is_client_error() || current.is_server_error() {
        current
    } else {
        error.status_code()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::body_bytes;
    use mnemosyne_core::{EngineError, FailureCode};
    use serde_json::{json, Value};

    async fn json_body(response: Response) -> Value {
        let bytes = body_bytes(response.into_body()).await;
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_default_configuration() {
        let normalizer = ErrorNormalizationMiddleware::default();
        assert!(!normalizer.expose_internal_errors);
        assert_eq!(normalizer.internal_error_message, "An internal error occurred");
    }

    #[test]
    fn test_resolve_status() {
        let err = PipelineError::PayloadTooLarge { limit: 1 };
        assert_eq!(resolve_status(StatusCode::OK, &err), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(resolve_status(StatusCode::CONFLICT, &err), StatusCode::CONFLICT);
        assert_eq!(
            resolve_status(StatusCode::MOVED_PERMANENTLY, &err),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[tokio::test]
    async fn test_client_error_envelope() {
        let normalizer = ErrorNormalizationMiddleware::new();
        let ctx = MiddlewareContext::new();
        let error = PipelineError::from(EngineError::idempotency(
            FailureCode::FingerprintMismatch,
            "payload differs",
        ));

        let response = normalizer.respond(&ctx, ResponseWriter::new(), error);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "IDEMPOTENCY_FINGERPRINT_MISMATCH");
        assert_eq!(
            body["error"]["message"],
            "idempotency failure (IDEMPOTENCY_FINGERPRINT_MISMATCH): payload differs"
        );
        assert_eq!(body["error"]["request_id"], ctx.request_id().to_string());
    }

    #[tokio::test]
    async fn test_server_error_hides_details() {
        let normalizer = ErrorNormalizationMiddleware::new();
        let ctx = MiddlewareContext::new();
        let error = PipelineError::from(EngineError::other("connection refused"));

        let response = normalizer.respond(&ctx, ResponseWriter::new(), error);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "ENGINE_ERROR");
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_expose_internal_errors() {
        let normalizer = ErrorNormalizationMiddleware::new()
            .expose_internal_errors(true)
            .internal_error_message("unused");
        let ctx = MiddlewareContext::new();
        let error = PipelineError::from(EngineError::other("connection refused"));

        let body = json_body(normalizer.respond(&ctx, ResponseWriter::new(), error)).await;
        assert_eq!(body["error"]["message"], "engine error: connection refused");
    }

    #[tokio::test]
    async fn test_headers_set_before_forwarding_are_kept() {
        let normalizer = ErrorNormalizationMiddleware::new();
        let ctx = MiddlewareContext::new();

        let mut sink = ResponseWriter::new();
        sink.set_header(
            http::header::RETRY_AFTER,
            HeaderValue::from_static("1"),
        );
        sink.set_status(StatusCode::CONFLICT);

        let response = normalizer.respond(
            &ctx,
            sink,
            PipelineError::from(EngineError::in_progress("busy")),
        );
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.headers()[http::header::RETRY_AFTER], "1");
    }

    #[tokio::test]
    async fn test_replayed_error_is_written_verbatim() {
        let normalizer = ErrorNormalizationMiddleware::new();
        let ctx = MiddlewareContext::new();

        let mut sink = ResponseWriter::new();
        sink.set_status(StatusCode::PAYMENT_REQUIRED);

        let payload = json!({"message": "card declined"});
        let response = normalizer.respond(
            &ctx,
            sink,
            PipelineError::Replayed {
                payload: payload.clone(),
            },
        );

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(json_body(response).await, payload);
    }
}
