//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that all middleware stages
//! implement, the [`Next`] chain that continues processing, and the
//! [`ErrorHandler`] behind the chain's error channel.
//!
//! A stage ends its part of the request in one of three ways: it continues
//! the chain with [`Next::run`], it returns a response it built itself, or it
//! forwards an error with [`Next::fail`].
//!
//! # Example
//!
//! ```
//! use mnemosyne_middleware::{BoxFuture, Middleware, Next, Request, Response};
//! use mnemosyne_middleware::context::MiddlewareContext;
//!
//! struct LoggingMiddleware;
//!
//! impl Middleware for LoggingMiddleware {
//!     fn name(&self) -> &'static str {
//!         "logging"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut MiddlewareContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Response> {
//!         Box::pin(async move {
//!             tracing::debug!(request_id = %ctx.request_id(), "request");
//!             let response = next.run(ctx, request).await;
//!             tracing::debug!(status = %response.status(), "response");
//!             response
//!         })
//!     }
//! }
//! ```

use crate::context::MiddlewareContext;
use crate::error::PipelineError;
use crate::sink::ResponseWriter;
use crate::stages::error_normalization::ErrorNormalizationMiddleware;
use crate::types::{Request, Response};

pub use mnemosyne_core::BoxFuture;

/// Error normalizer used when a chain is built without an explicit handler.
static DEFAULT_ERROR_HANDLER: ErrorNormalizationMiddleware = ErrorNormalizationMiddleware::new();

/// The core middleware trait.
///
/// Middleware receives a mutable context, the incoming request, and a
/// [`Next`] to continue the chain.
///
/// # Invariants
///
/// - Middleware MUST end the request exactly once: `next.run()`, its own
///   response, or `next.fail()`
/// - Middleware MUST NOT suppress errors from downstream middleware
pub trait Middleware: Send + Sync + 'static {
    /// Returns the unique name of this middleware stage.
    ///
    /// This name is used for logging and debugging.
    fn name(&self) -> &'static str;

    /// Process the request through this middleware.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The mutable middleware context
    /// * `request` - The incoming HTTP request
    /// * `next` - Continuation of the chain, including its error channel
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response>;
}

/// Turns an error forwarded through [`Next::fail`] into a response.
///
/// `sink` carries whatever status and headers the failing stage already set.
pub trait ErrorHandler: Send + Sync {
    /// Builds the response for `error`.
    fn handle(&self, ctx: &MiddlewareContext, sink: ResponseWriter, error: PipelineError)
        -> Response;
}

impl<F> ErrorHandler for F
where
    F: Fn(&MiddlewareContext, ResponseWriter, PipelineError) -> Response + Send + Sync,
{
    fn handle(
        &self,
        ctx: &MiddlewareContext,
        sink: ResponseWriter,
        error: PipelineError,
    ) -> Response {
        self(ctx, sink, error)
    }
}

/// Terminal handler of a chain.
type HandlerFn<'a> =
    Box<dyn FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a>;

/// Continuation of the middleware chain.
///
/// Consumed by either [`run`](Self::run) or [`fail`](Self::fail), so a stage
/// can only end its part of the request once.
pub struct Next<'a> {
    inner: NextInner<'a>,
    on_error: &'a dyn ErrorHandler,
}

/// Internal representation of the next middleware chain.
enum NextInner<'a> {
    /// More middleware to process
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    /// End of chain - invoke the handler
    Handler(HandlerFn<'a>),
}

impl<'a> Next<'a> {
    /// Creates a `Next` that invokes `middleware`, then `next`.
    ///
    /// The error channel is inherited from `next`.
    pub fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        let on_error = next.on_error;
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
            on_error,
        }
    }

    /// Creates a terminal `Next` that invokes the handler.
    ///
    /// Errors are rendered by the default [`ErrorNormalizationMiddleware`].
    pub fn handler<F>(f: F) -> Self
    where
        F: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        Self::handler_with_errors(f, &DEFAULT_ERROR_HANDLER)
    }

    /// Creates a terminal `Next` whose error channel is `on_error`.
    pub fn handler_with_errors<F>(f: F, on_error: &'a dyn ErrorHandler) -> Self
    where
        F: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Handler(Box::new(f)),
            on_error,
        }
    }

    /// Invokes the next middleware or handler in the chain.
    ///
    /// This consumes `self` to ensure it can only be called once.
    pub async fn run(self, ctx: &mut MiddlewareContext, request: Request) -> Response {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(ctx, request, *next).await,
            NextInner::Handler(handler) => handler(ctx, request).await,
        }
    }

    /// Forwards `error` to the chain's error handler instead of continuing.
    ///
    /// The rest of the chain, handler included, is skipped.
    pub fn fail(
        self,
        ctx: &MiddlewareContext,
        sink: ResponseWriter,
        error: PipelineError,
    ) -> Response {
        self.on_error.handle(ctx, sink, error)
    }
}
