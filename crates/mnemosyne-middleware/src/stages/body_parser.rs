//! JSON body parser middleware.
//!
//! Parses JSON request bodies into a [`ParsedBody`] context extension so
//! later stages can read a structured body without touching the raw bytes.
//!
//! ## Behavior
//!
//! | Request                              | Result                          |
//! |--------------------------------------|---------------------------------|
//! | Body larger than `max_body_bytes`    | `PayloadTooLarge` (413)         |
//! | JSON content type, non-empty body    | [`ParsedBody`] set              |
//! | JSON content type, malformed body    | `MalformedBody` (400)           |
//! | Empty body or other content type     | passed through, no extension    |
//!
//! The request body itself is always forwarded unchanged.

use crate::context::MiddlewareContext;
use crate::error::PipelineError;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::sink::ResponseWriter;
use crate::types::{body_bytes, is_json_content_type, Request, Response};
use http::header::CONTENT_TYPE;
use http_body_util::Full;
use serde_json::Value;

/// Default body size limit: 1 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// A request body parsed as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

/// Middleware that parses JSON request bodies.
#[derive(Debug, Clone)]
pub struct BodyParserMiddleware {
    max_body_bytes: usize,
}

impl BodyParserMiddleware {
    /// Creates a body parser with the default size limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Sets the maximum accepted body size in bytes.
    #[must_use]
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

impl Default for BodyParserMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for BodyParserMiddleware {
    fn name(&self) -> &'static str {
        "body_parser"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let bytes = body_bytes(body).await;

            if bytes.len() > self.max_body_bytes {
                return next.fail(
                    ctx,
                    ResponseWriter::new(),
                    PipelineError::PayloadTooLarge {
                        limit: self.max_body_bytes,
                    },
                );
            }

            let declares_json = parts
                .headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .is_some_and(is_json_content_type);

            if declares_json && !bytes.is_empty() {
                match serde_json::from_slice::<Value>(&bytes) {
                    Ok(value) => ctx.set_extension(ParsedBody(value)),
                    Err(error) => {
                        tracing::debug!(
                            request_id = %ctx.request_id(),
                            error = %error,
                            "rejecting malformed JSON body"
                        );
                        return next.fail(
                            ctx,
                            ResponseWriter::new(),
                            PipelineError::MalformedBody(error),
                        );
                    }
                }
            }

            next.run(ctx, Request::from_parts(parts, Full::new(bytes)))
                .await
        })
    }
}
