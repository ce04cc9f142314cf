//! Main configuration types.
//!
//! This module provides the top-level [`MnemosyneConfig`] struct and its builder.

use http::HeaderName;
use serde::{Deserialize, Serialize};

use crate::{
    ConfigError, EngineOptions, InterceptorOptions, LogFormat, LoggingConfig, MetricsSettings,
    StorageSettings,
};
use std::net::SocketAddr;

/// Complete Mnemosyne configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use mnemosyne_config::MnemosyneConfig;
///
/// let config = MnemosyneConfig::default();
/// assert_eq!(config.storage.adapter, "memory");
/// assert_eq!(config.interceptor.replay_header, "idempotent-replayed");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct MnemosyneConfig {
    /// Storage adapter settings.
    #[serde(default)]
    pub storage: StorageSettings,

    /// Engine options.
    #[serde(default)]
    pub engine: EngineOptions,

    /// Interceptor options.
    #[serde(default)]
    pub interceptor: InterceptorOptions,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsSettings,
}

impl MnemosyneConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use mnemosyne_config::{InterceptorOptions, MnemosyneConfig};
    ///
    /// let config = MnemosyneConfig::builder()
    ///     .interceptor(InterceptorOptions {
    ///         replay_header: "x-replayed".to_string(),
    ///         ..Default::default()
    ///     })
    ///     .build();
    ///
    /// assert_eq!(config.interceptor.replay_header, "x-replayed");
    /// ```
    #[must_use]
    pub fn builder() -> MnemosyneConfigBuilder {
        MnemosyneConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The storage adapter name is empty
    /// - The key or replay header is not a valid HTTP header name
    /// - A TTL, the key length limit, the body limit or the evaluate timeout is zero
    /// - The log level is empty
    /// - Metrics are enabled with an unparsable address or an empty service name
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.adapter.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "storage.adapter",
                "must not be empty",
            ));
        }

        check_header_name("engine.key_header", &self.engine.key_header)?;
        check_header_name("interceptor.replay_header", &self.interceptor.replay_header)?;

        if self.engine.cache_ttl_secs == 0 {
            return Err(ConfigError::invalid_value(
                "engine.cache_ttl_secs",
                "must be greater than zero",
            ));
        }

        if self.engine.lock_ttl_secs == 0 {
            return Err(ConfigError::invalid_value(
                "engine.lock_ttl_secs",
                "must be greater than zero",
            ));
        }

        if self.engine.max_key_length == 0 {
            return Err(ConfigError::invalid_value(
                "engine.max_key_length",
                "must be greater than zero",
            ));
        }

        if self.interceptor.evaluate_timeout_ms == Some(0) {
            return Err(ConfigError::invalid_value(
                "interceptor.evaluate_timeout_ms",
                "must be greater than zero when set",
            ));
        }

        if self.interceptor.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "interceptor.max_body_bytes",
                "must be greater than zero",
            ));
        }

        if self.logging.enabled && self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "logging.level",
                "must not be empty",
            ));
        }

        if self.metrics.enabled {
            if self.metrics.addr.parse::<SocketAddr>().is_err() {
                return Err(ConfigError::invalid_value(
                    "metrics.addr",
                    format!("invalid socket address: {:?}", self.metrics.addr),
                ));
            }

            if self.metrics.service_name.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "metrics.service_name",
                    "must not be empty",
                ));
            }
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Pretty, debug-level logging.
    ///
    /// # Example
    ///
    /// ```
    /// use mnemosyne_config::MnemosyneConfig;
    ///
    /// let config = MnemosyneConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config
    }

    /// Create a production configuration preset.
    ///
    /// JSON logging at info level, metrics enabled, and a bounded evaluate
    /// call.
    ///
    /// # Example
    ///
    /// ```
    /// use mnemosyne_config::{LogFormat, MnemosyneConfig};
    ///
    /// let config = MnemosyneConfig::production();
    /// assert_eq!(config.logging.format, LogFormat::Json);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.interceptor.evaluate_timeout_ms = Some(5_000);
        config.metrics.enabled = true;
        config
    }
}

fn check_header_name(field: &str, value: &str) -> Result<(), ConfigError> {
    HeaderName::from_bytes(value.as_bytes())
        .map(|_| ())
        .map_err(|_| ConfigError::invalid_value(field, format!("invalid header name: {value:?}")))
}

/// Builder for [`MnemosyneConfig`].
#[derive(Debug, Default)]
pub struct MnemosyneConfigBuilder {
    storage: Option<StorageSettings>,
    engine: Option<EngineOptions>,
    interceptor: Option<InterceptorOptions>,
    logging: Option<LoggingConfig>,
    metrics: Option<MetricsSettings>,
}

impl MnemosyneConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage settings.
    #[must_use]
    pub fn storage(mut self, storage: StorageSettings) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the engine options.
    #[must_use]
    pub fn engine(mut self, engine: EngineOptions) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Set the interceptor options.
    #[must_use]
    pub fn interceptor(mut self, interceptor: InterceptorOptions) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Set the logging configuration.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Set the metrics settings.
    #[must_use]
    pub fn metrics(mut self, metrics: MetricsSettings) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the configuration.
    ///
    /// Any unset sections will use their default values.
    #[must_use]
    pub fn build(self) -> MnemosyneConfig {
        MnemosyneConfig {
            storage: self.storage.unwrap_or_default(),
            engine: self.engine.unwrap_or_default(),
            interceptor: self.interceptor.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
            metrics: self.metrics.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<MnemosyneConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
