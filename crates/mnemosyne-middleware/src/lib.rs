//! # Mnemosyne Middleware
//!
//! Idempotency interception for an async HTTP middleware pipeline.
//!
//! ## Pipeline Stages
//!
//! ```text
//! Request → BodyParser → Idempotency ─┬─ new ──────▶ Handler ──▶ CaptureSink ──▶ Response
//!                                     ├─ cached ───▶ replay ───────────────────▶ Response
//!                                     └─ failure ──▶ Next::fail ─▶ ErrorHandler ▶ Response
//! ```
//!
//! | Stage | Middleware  | Purpose                                         |
//! |-------|-------------|-------------------------------------------------|
//! | 1     | Body Parser | Parse JSON bodies for the request snapshot      |
//! | 2     | Idempotency | Evaluate, capture first-time, replay duplicates |
//!
//! ## Key Types
//!
//! - [`Middleware`] / [`Next`] - The stage contract and chain continuation
//! - [`ResponseSink`] - The response boundary, decorated by [`CaptureSink`]
//! - [`ErrorHandler`] - Renders errors forwarded through [`Next::fail`]
//! - [`Pipeline`] - Runs the stages in order
//!
//! ## Example
//!
//! ```
//! use mnemosyne_middleware::pipeline::Pipeline;
//! use mnemosyne_middleware::stages::{BodyParserMiddleware, IdempotencyMiddleware};
//! use mnemosyne_core::fixtures::ScriptedEngine;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(ScriptedEngine::new());
//! let pipeline = Pipeline::builder()
//!     .stage(BodyParserMiddleware::new())
//!     .stage(IdempotencyMiddleware::new(engine))
//!     .build();
//!
//! assert_eq!(pipeline.stage_names(), ["body_parser", "idempotency"]);
//! ```

#![doc(html_root_url = "https://docs.rs/mnemosyne-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod sink;
pub mod stages;
pub mod types;

// Re-export main types at crate root
pub use context::MiddlewareContext;
pub use error::PipelineError;
pub use middleware::{BoxFuture, ErrorHandler, Middleware, Next};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder};
pub use sink::{ResponseSink, ResponseWriter};
pub use stages::{
    BodyParserMiddleware, CaptureSink, CompletionDispatcher, ErrorNormalizationMiddleware,
    IdempotencyMiddleware, ParsedBody,
};
pub use types::{Request, Response};
