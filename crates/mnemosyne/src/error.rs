//! Setup errors.

use mnemosyne_config::ConfigError;
use mnemosyne_core::EngineError;
use mnemosyne_telemetry::TelemetryError;
use thiserror::Error;

/// Errors raised while assembling the idempotency middleware.
#[derive(Error, Debug)]
pub enum SetupError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The engine builder could not construct an engine.
    #[error("failed to build idempotency engine for adapter '{adapter}': {source}")]
    Engine {
        /// The configured storage adapter.
        adapter: String,
        /// The builder's error.
        #[source]
        source: EngineError,
    },

    /// A configured header name is not a valid HTTP header name.
    #[error("invalid header name for {field}: {value:?}")]
    InvalidHeader {
        /// The configuration field.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Logging could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}
