//! Prometheus metrics for Mnemosyne.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `mnemosyne_decisions_total` | Counter | `decision` | Engine decisions (`new`, `replayed`, `failed`) |
//! | `mnemosyne_completions_total` | Counter | `result` | Completion calls (`ok`, `error`) |
//! | `mnemosyne_completions_in_flight` | Gauge | - | Completion calls not yet finished |
//!
//! Recording functions are no-ops until a recorder is installed, so the
//! middleware can call them unconditionally.
//!
//! # Example
//!
//! ```rust
//! use mnemosyne_telemetry::metrics::{record_decision, Decision};
//!
//! record_decision(Decision::Replayed);
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;

/// Counter of engine decisions, labelled by `decision`.
pub const DECISIONS_TOTAL: &str = "mnemosyne_decisions_total";

/// Counter of completion calls, labelled by `result`.
pub const COMPLETIONS_TOTAL: &str = "mnemosyne_completions_total";

/// Gauge of completion calls still running.
pub const COMPLETIONS_IN_FLIGHT: &str = "mnemosyne_completions_in_flight";

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address to expose metrics on (e.g., "0.0.0.0:9090").
    pub addr: String,

    /// Service name, attached to every metric as the `service` label.
    pub service_name: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: "0.0.0.0:9090".to_string(),
            service_name: "mnemosyne".to_string(),
        }
    }
}

/// Outcome of one `evaluate` call, as seen by the interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// First-time request; the response will be captured.
    New,
    /// Duplicate; a cached response was replayed.
    Replayed,
    /// The engine failed or rejected the request.
    Failed,
}

impl Decision {
    /// Returns the label value for this decision.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Replayed => "replayed",
            Self::Failed => "failed",
        }
    }
}

/// Initializes the metrics subsystem.
///
/// Installs a Prometheus recorder and spawns its HTTP listener on
/// `config.addr`. Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` if there is no current runtime or the
/// recorder cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| TelemetryError::MetricsInit(format!("no Tokio runtime: {e}")))?;

    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", config.service_name.clone())
        .build()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    runtime.spawn(async move {
        if let Err(error) = exporter.await {
            tracing::warn!(error = ?error, "metrics exporter stopped");
        }
    });

    let _ = METRICS_HANDLE.set(handle);

    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

/// Registers descriptions for all standard metrics.
fn register_metric_descriptions() {
    describe_counter!(DECISIONS_TOTAL, "Idempotency engine decisions by outcome");
    describe_counter!(COMPLETIONS_TOTAL, "Idempotency completion calls by result");
    describe_gauge!(
        COMPLETIONS_IN_FLIGHT,
        "Idempotency completion calls currently running"
    );
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Records one engine decision.
pub fn record_decision(decision: Decision) {
    counter!(DECISIONS_TOTAL, "decision" => decision.as_str()).increment(1);
}

/// Records one finished completion call.
pub fn record_completion(succeeded: bool) {
    let result = if succeeded { "ok" } else { "error" };
    counter!(COMPLETIONS_TOTAL, "result" => result).increment(1);
}

/// Guard that tracks one running completion call in
/// `mnemosyne_completions_in_flight`.
///
/// The gauge is decremented on drop, including when the task panics.
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(COMPLETIONS_IN_FLIGHT).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(COMPLETIONS_IN_FLIGHT).decrement(1.0);
    }
}
