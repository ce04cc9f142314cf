//! Middleware factory.
//!
//! Builds the engine once from configuration and returns the ordered stage
//! list `[BodyParserMiddleware, IdempotencyMiddleware]`, ready to hand to
//! [`PipelineBuilder::stages`](mnemosyne_middleware::PipelineBuilder::stages).

use crate::error::SetupError;
use http::HeaderName;
use mnemosyne_config::{EngineOptions, InterceptorOptions, MnemosyneConfig, StorageSettings};
use mnemosyne_core::{BoxFuture, EngineResult, SharedEngine};
use mnemosyne_middleware::{BodyParserMiddleware, BoxedMiddleware, IdempotencyMiddleware};
use std::sync::Arc;

/// Constructs the idempotency engine from configuration.
///
/// Implemented by the host; storage adapters live outside this crate.
///
/// # Example
///
/// ```
/// use mnemosyne::{EngineBuilder, EngineOptions, StorageSettings};
/// use mnemosyne_core::fixtures::ScriptedEngine;
/// use mnemosyne_core::{BoxFuture, EngineResult, SharedEngine};
/// use std::sync::Arc;
///
/// struct InMemory;
///
/// impl EngineBuilder for InMemory {
///     fn build<'a>(
///         &'a self,
///         _storage: &'a StorageSettings,
///         _options: &'a EngineOptions,
///     ) -> BoxFuture<'a, EngineResult<SharedEngine>> {
///         Box::pin(async { Ok(Arc::new(ScriptedEngine::new()) as SharedEngine) })
///     }
/// }
/// ```
pub trait EngineBuilder: Send + Sync {
    /// Builds an engine for the given storage settings and options.
    fn build<'a>(
        &'a self,
        storage: &'a StorageSettings,
        options: &'a EngineOptions,
    ) -> BoxFuture<'a, EngineResult<SharedEngine>>;
}

/// Validates `config`, builds the engine once and returns the stage list.
///
/// # Errors
///
/// Returns `SetupError::Config` if validation fails and
/// `SetupError::Engine` if the builder fails.
pub async fn idempotency_middleware<B>(
    config: &MnemosyneConfig,
    builder: &B,
) -> Result<Vec<BoxedMiddleware>, SetupError>
where
    B: EngineBuilder + ?Sized,
{
    config.validate()?;

    let engine = builder
        .build(&config.storage, &config.engine)
        .await
        .map_err(|source| SetupError::Engine {
            adapter: config.storage.adapter.clone(),
            source,
        })?;

    tracing::info!(
        adapter = %config.storage.adapter,
        cache_ttl_secs = config.engine.cache_ttl_secs,
        "idempotency engine ready"
    );

    middleware_with_engine(engine, &config.interceptor)
}

/// Returns the stage list for an engine the host built itself.
///
/// # Errors
///
/// Returns `SetupError::InvalidHeader` if the replay header name is invalid.
///
/// `options.max_body_bytes` sets the body parser's limit and
/// `options.evaluate_timeout_ms` bounds each `evaluate` call.
///
/// # Example
///
/// ```
/// use mnemosyne::{middleware_with_engine, InterceptorOptions};
/// use mnemosyne_core::fixtures::ScriptedEngine;
/// use std::sync::Arc;
///
/// let stages = middleware_with_engine(
///     Arc::new(ScriptedEngine::new()),
///     &InterceptorOptions::default(),
/// )?;
///
/// let names: Vec<_> = stages.iter().map(|stage| stage.name()).collect();
/// assert_eq!(names, ["body_parser", "idempotency"]);
/// # Ok::<(), mnemosyne::SetupError>(())
/// ```
pub fn middleware_with_engine(
    engine: SharedEngine,
    options: &InterceptorOptions,
) -> Result<Vec<BoxedMiddleware>, SetupError> {
    let replay_header = HeaderName::from_bytes(options.replay_header.as_bytes()).map_err(|_| {
        SetupError::InvalidHeader {
            field: "interceptor.replay_header",
            value: options.replay_header.clone(),
        }
    })?;

    let mut idempotency = IdempotencyMiddleware::new(engine).with_replay_header(replay_header);
    if let Some(timeout) = options.evaluate_timeout() {
        idempotency = idempotency.with_evaluate_timeout(timeout);
    }

    Ok(vec![
        Arc::new(BodyParserMiddleware::new().max_body_bytes(options.max_body_bytes)),
        Arc::new(idempotency),
    ])
}
