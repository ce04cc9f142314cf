//! # Mnemosyne
//!
//! **Idempotency interception for async HTTP middleware pipelines**
//!
//! Mnemosyne sits between a client and a handler and asks an idempotency
//! engine whether each request is new or a duplicate:
//!
//! - **First-time requests** run normally; the response is captured,
//!   normalized and stored in the background without delaying the client
//! - **Duplicates** are answered from cache with the original status,
//!   allowlisted headers and body, marked with `idempotent-replayed: true`
//! - **Engine failures** (missing key, request in progress, storage down) are
//!   mapped to HTTP statuses and forwarded to the pipeline's error handler
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mnemosyne::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_optional_file("mnemosyne.toml")?
//!         .with_dotenv()?
//!         .with_env_prefix(DEFAULT_ENV_PREFIX)
//!         .load()?;
//!
//!     mnemosyne::init_logging(&config.logging)?;
//!     mnemosyne::init_metrics(&config.metrics)?;
//!
//!     let stages = idempotency_middleware(&config, &MyEngineBuilder).await?;
//!     let pipeline = Pipeline::builder().stages(stages).build();
//!     // pipeline.process(ctx, request, handler).await
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → BodyParser → Idempotency ─┬─ new ─────▶ Handler ─▶ CaptureSink ─▶ Response
//!                                     │                            └─▶ engine.complete (spawned)
//!                                     ├─ cached ──▶ replay ────────────────────▶ Response
//!                                     └─ failure ─▶ ErrorHandler ──────────────▶ Response
//! ```

#![doc(html_root_url = "https://docs.rs/mnemosyne/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod factory;

pub use error::SetupError;
pub use factory::{idempotency_middleware, middleware_with_engine, EngineBuilder};

// Re-export member crates
pub use mnemosyne_config as config;
pub use mnemosyne_core as core;
pub use mnemosyne_middleware as middleware;
pub use mnemosyne_telemetry as telemetry;

pub use mnemosyne_config::{
    EngineOptions, InterceptorOptions, LogFormat, LoggingConfig, MetricsSettings, MnemosyneConfig,
    StorageSettings,
};
pub use mnemosyne_telemetry::metrics::render_metrics;

use mnemosyne_telemetry::{LogConfig, MetricsConfig};

/// Maps the `[logging]` section onto the telemetry logging settings.
///
/// `pretty` selects the development layout (span events, file and line),
/// `json` the production layout. The configured level always wins.
#[must_use]
pub fn log_config(logging: &LoggingConfig) -> LogConfig {
    let base = match logging.format {
        LogFormat::Pretty => LogConfig::development(),
        LogFormat::Json => LogConfig::production(),
    };

    LogConfig {
        enabled: logging.enabled,
        level: logging.level.clone(),
        ..base
    }
}

/// Installs the global logging subscriber described by `logging`.
///
/// # Errors
///
/// Returns `SetupError::Telemetry` if the level is not a valid filter or a
/// subscriber is already installed.
pub fn init_logging(logging: &LoggingConfig) -> Result<(), SetupError> {
    mnemosyne_telemetry::init_logging(&log_config(logging))?;
    Ok(())
}

/// Maps the `[metrics]` section onto the telemetry metrics settings.
#[must_use]
pub fn metrics_config(metrics: &MetricsSettings) -> MetricsConfig {
    MetricsConfig {
        enabled: metrics.enabled,
        addr: metrics.addr.clone(),
        service_name: metrics.service_name.clone(),
    }
}

/// Installs the Prometheus exporter described by `metrics`.
///
/// Does nothing when metrics are disabled. Must be called from within a
/// Tokio runtime. Hosts that serve their own scrape endpoint can read the
/// exposition text with [`render_metrics`].
///
/// # Errors
///
/// Returns `SetupError::Telemetry` if the address is invalid or a recorder
/// is already installed.
pub fn init_metrics(metrics: &MetricsSettings) -> Result<(), SetupError> {
    mnemosyne_telemetry::init_metrics(&metrics_config(metrics))?;
    Ok(())
}

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use mnemosyne::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        idempotency_middleware, init_logging, init_metrics, middleware_with_engine,
        render_metrics, EngineBuilder, SetupError,
    };

    pub use mnemosyne_config::{
        ConfigError, ConfigLoader, EngineOptions, InterceptorOptions, LoggingConfig,
        MetricsSettings, MnemosyneConfig, StorageSettings, DEFAULT_ENV_PREFIX,
    };

    pub use mnemosyne_core::{
        CachedOutcome, EngineError, EngineResult, FailureCode, IdempotencyEngine,
        IdempotencyRequest, SharedEngine,
    };

    pub use mnemosyne_middleware::{
        BoxedMiddleware, ErrorHandler, Middleware, MiddlewareContext, Next, Pipeline,
        PipelineError, Request, Response, ResponseSink, ResponseWriter,
    };
}
