//! Middleware stages.
//!
//! ## Request Stages
//!
//! 1. [`body_parser`] - Parse JSON request bodies into the context
//! 2. [`idempotency`] - Evaluate, capture and replay
//!
//! ## Error Channel
//!
//! [`error_normalization`] renders errors forwarded through
//! [`Next::fail`](crate::Next::fail).

pub mod body_parser;
pub mod error_normalization;
pub mod idempotency;

// Re-export main types
pub use body_parser::{BodyParserMiddleware, ParsedBody};
pub use error_normalization::ErrorNormalizationMiddleware;
pub use idempotency::{CaptureSink, CompletionDispatcher, IdempotencyMiddleware};
