//! Ordered middleware pipeline.
//!
//! This module implements the immutable pipeline that requests flow through.
//! The stages are fixed once the pipeline is built.
//!
//! ## Pipeline Stages
//!
//! The idempotency pipeline has two stages in a fixed order:
//!
//! 1. **Body Parser** - Parse JSON request bodies into the context
//! 2. **Idempotency** - Evaluate, capture and replay
//!
//! Errors forwarded by any stage through [`Next::fail`] are rendered by the
//! pipeline's [`ErrorHandler`], which defaults to
//! [`ErrorNormalizationMiddleware`].

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, ErrorHandler, Middleware, Next};
use crate::stages::error_normalization::ErrorNormalizationMiddleware;
use crate::types::{Request, Response};
use std::sync::Arc;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The middleware pipeline.
///
/// This pipeline cannot be modified after construction.
///
/// # Example
///
/// ```
/// use mnemosyne_middleware::pipeline::Pipeline;
/// use mnemosyne_middleware::stages::BodyParserMiddleware;
///
/// let pipeline = Pipeline::builder()
///     .stage(BodyParserMiddleware::new())
///     .build();
///
/// assert_eq!(pipeline.stage_names(), vec!["body_parser"]);
/// ```
pub struct Pipeline {
    /// Stages, in execution order
    stages: Vec<BoxedMiddleware>,

    /// Renders errors forwarded through the chain's error channel
    error_handler: Arc<dyn ErrorHandler>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Processes a request through the entire pipeline.
    ///
    /// The request flows through all stages in order, then to the handler.
    pub async fn process<H>(
        &self,
        mut ctx: MiddlewareContext,
        request: Request,
        handler: H,
    ) -> Response
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let next = self.build_chain(handler);
        next.run(&mut ctx, request).await
    }

    /// Builds the middleware chain for a request.
    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut MiddlewareContext, Request) -> BoxFuture<'static, Response> + Send + 'a,
    {
        let mut next = Next::handler_with_errors(handler, self.error_handler.as_ref());

        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }

        next
    }

    /// Returns the names of all middleware stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|mw| mw.name()).collect()
    }
}

/// Builder for constructing a [`Pipeline`].
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
}

impl PipelineBuilder {
    /// Creates an empty pipeline builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            error_handler: None,
        }
    }

    /// Appends a middleware stage.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends already boxed stages, e.g. the list returned by the
    /// middleware factory.
    #[must_use]
    pub fn stages<I>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = BoxedMiddleware>,
    {
        self.stages.extend(stages);
        self
    }

    /// Installs a custom error handler.
    ///
    /// # Example
    ///
    /// ```
    /// use mnemosyne_middleware::{MiddlewareContext, PipelineError, ResponseSink, ResponseWriter};
    /// use mnemosyne_middleware::pipeline::Pipeline;
    /// use bytes::Bytes;
    ///
    /// let pipeline = Pipeline::builder()
    ///     .error_handler(|_ctx: &MiddlewareContext, sink: ResponseWriter, err: PipelineError| {
    ///         sink.send(Bytes::from(err.to_string()))
    ///     })
    ///     .build();
    /// # let _ = pipeline;
    /// ```
    #[must_use]
    pub fn error_handler<E: ErrorHandler + 'static>(mut self, handler: E) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Arc::new(ErrorNormalizationMiddleware::new())),
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
