//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Storage section, handed to the host's engine builder.
///
/// Only `adapter` is interpreted here; `options` is an opaque table the
/// storage adapter reads for itself.
///
/// # Example
///
/// ```
/// use mnemosyne_config::StorageSettings;
///
/// let storage = StorageSettings::default();
/// assert_eq!(storage.adapter, "memory");
/// assert!(storage.options.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StorageSettings {
    /// Storage adapter name (e.g., "memory", "redis").
    #[serde(default = "default_adapter")]
    pub adapter: String,

    /// Adapter-specific options.
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            adapter: default_adapter(),
            options: Map::new(),
        }
    }
}

fn default_adapter() -> String {
    "memory".to_string()
}

/// Engine section.
///
/// These values are passed to the engine builder; the interception layer
/// never reads them itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineOptions {
    /// Request header carrying the idempotency key.
    #[serde(default = "default_key_header")]
    pub key_header: String,

    /// How long a completed response stays replayable, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// How long an in-flight lock is held before it expires, in seconds.
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,

    /// Longest accepted idempotency key.
    #[serde(default = "default_max_key_length")]
    pub max_key_length: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            key_header: default_key_header(),
            cache_ttl_secs: default_cache_ttl(),
            lock_ttl_secs: default_lock_ttl(),
            max_key_length: default_max_key_length(),
        }
    }
}

fn default_key_header() -> String {
    "idempotency-key".to_string()
}

fn default_cache_ttl() -> u64 {
    86_400
}

fn default_lock_ttl() -> u64 {
    30
}

fn default_max_key_length() -> usize {
    255
}

/// Interceptor section.
///
/// # Example
///
/// ```
/// use mnemosyne_config::InterceptorOptions;
/// use std::time::Duration;
///
/// let options = InterceptorOptions {
///     evaluate_timeout_ms: Some(250),
///     ..Default::default()
/// };
/// assert_eq!(options.replay_header, "idempotent-replayed");
/// assert_eq!(options.max_body_bytes, 1024 * 1024);
/// assert_eq!(options.evaluate_timeout(), Some(Duration::from_millis(250)));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InterceptorOptions {
    /// Response header marking replayed responses.
    #[serde(default = "default_replay_header")]
    pub replay_header: String,

    /// Upper bound on a single `evaluate` call. Unset means no bound.
    #[serde(default)]
    pub evaluate_timeout_ms: Option<u64>,

    /// Largest request body the body parser buffers; larger bodies get 413.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl InterceptorOptions {
    /// Returns the evaluate timeout as a [`Duration`].
    #[must_use]
    pub fn evaluate_timeout(&self) -> Option<Duration> {
        self.evaluate_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for InterceptorOptions {
    fn default() -> Self {
        Self {
            replay_header: default_replay_header(),
            evaluate_timeout_ms: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_replay_header() -> String {
    "idempotent-replayed".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level or `EnvFilter` directive (e.g., "info", "mnemosyne=debug").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON, one object per line.
    #[default]
    Json,
    /// Human-readable output.
    Pretty,
}

/// Metrics section.
///
/// Disabled by default; when enabled the host installs a Prometheus
/// exporter listening on `addr`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSettings {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Listen address for the scrape endpoint (e.g., "0.0.0.0:9090").
    #[serde(default = "default_metrics_addr")]
    pub addr: String,

    /// Value of the `service` label attached to every metric.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
            service_name: default_service_name(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_service_name() -> String {
    "mnemosyne".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let engine = EngineOptions::default();
        assert_eq!(engine.key_header, "idempotency-key");
        assert_eq!(engine.cache_ttl_secs, 86_400);
        assert_eq!(engine.lock_ttl_secs, 30);
        assert_eq!(engine.max_key_length, 255);

        let interceptor = InterceptorOptions::default();
        assert_eq!(interceptor.replay_header, "idempotent-replayed");
        assert_eq!(interceptor.evaluate_timeout(), None);
        assert_eq!(interceptor.max_body_bytes, 1_048_576);

        let metrics = MetricsSettings::default();
        assert!(!metrics.enabled);
        assert_eq!(metrics.addr, "0.0.0.0:9090");
        assert_eq!(metrics.service_name, "mnemosyne");

        let logging = LoggingConfig::default();
        assert!(logging.enabled);
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, LogFormat::Json);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let engine: EngineOptions = toml::from_str("cache_ttl_secs = 60").unwrap();
        assert_eq!(engine.cache_ttl_secs, 60);
        assert_eq!(engine.lock_ttl_secs, 30);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<InterceptorOptions, _> = toml::from_str("replay_hdr = \"x\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_storage_options_table() {
        let storage: StorageSettings = toml::from_str(
            r#"
            adapter = "redis"

            [options]
            url = "redis://localhost:6379"
            pool_size = 8
            "#,
        )
        .unwrap();

        assert_eq!(storage.adapter, "redis");
        assert_eq!(storage.options["url"], "redis://localhost:6379");
        assert_eq!(storage.options["pool_size"], 8);
    }

    #[test]
    fn test_log_format_serde() {
        let json = serde_json::to_string(&LogFormat::Pretty).unwrap();
        assert_eq!(json, "\"pretty\"");

        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
    }
}
