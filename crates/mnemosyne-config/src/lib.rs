//! Typed configuration for Mnemosyne.
//!
//! This crate provides a strongly-typed configuration system with support for:
//! - TOML and JSON configuration files
//! - `.env` files and environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → .env → env)
//!
//! # Overview
//!
//! [`MnemosyneConfig`] holds five sections:
//!
//! - [`StorageSettings`] - Storage adapter name and opaque adapter options
//! - [`EngineOptions`] - Values handed to the idempotency engine builder
//! - [`InterceptorOptions`] - Replay header, evaluate timeout and body limit
//! - [`LoggingConfig`] - Log level and format
//! - [`MetricsSettings`] - Prometheus exporter address and service label
//!
//! # Example
//!
//! ```no_run
//! use mnemosyne_config::ConfigLoader;
//!
//! # fn main() -> Result<(), mnemosyne_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_optional_file("mnemosyne.toml")?
//!     .with_dotenv()?
//!     .with_env_prefix("MNEMOSYNE")
//!     .load()?;
//!
//! println!("storage adapter: {}", config.storage.adapter);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [storage]
//! adapter = "redis"
//!
//! [storage.options]
//! url = "redis://localhost:6379"
//!
//! [engine]
//! key_header = "idempotency-key"
//! cache_ttl_secs = 86400
//! lock_ttl_secs = 30
//! max_key_length = 255
//!
//! [interceptor]
//! replay_header = "idempotent-replayed"
//! evaluate_timeout_ms = 5000
//! max_body_bytes = 1048576
//!
//! [logging]
//! enabled = true
//! level = "info"
//! format = "json"
//!
//! [metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! service_name = "mnemosyne"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden via environment variables using the format
//! `PREFIX__SECTION__KEY`. For example:
//!
//! - `MNEMOSYNE__ENGINE__LOCK_TTL_SECS=10`
//! - `MNEMOSYNE__INTERCEPTOR__EVALUATE_TIMEOUT_MS=none`
//! - `MNEMOSYNE__STORAGE__OPTIONS__URL=redis://cache:6379`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::*;
