//! Prometheus metrics for the gateway.
//!
//! Provides metrics for:
//! - Gateway decisions by outcome
//! - Credential verification results and latency
//! - Upstream forwarding
//!
//! Without the `prometheus` feature every recording function is a no-op.

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

/// Global Prometheus handle for the metrics endpoint.
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics system with the given configuration.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &seconds_from_ms(&config.latency_buckets_ms),
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?
        .install_recorder()
        .map_err(MetricsError::Install)?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Setup("Metrics already initialized".to_string()))?;

    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

/// Convert millisecond buckets to seconds.
#[cfg(feature = "prometheus")]
fn seconds_from_ms(ms_buckets: &[f64]) -> Vec<f64> {
    ms_buckets.iter().map(|ms| ms / 1000.0).collect()
}

/// Get the Prometheus handle for rendering metrics.
#[cfg(feature = "prometheus")]
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record one gateway decision.
///
/// `outcome` is one of "exempt", "allow", "redirect_login", "redirect_dashboard", "reject".
pub fn record_gateway_decision(outcome: &'static str) {
    #[cfg(feature = "prometheus")]
    {
        counter!("gateway_decisions_total", "outcome" => outcome).increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = outcome;
    }
}

/// Record a credential verification result ("success" or a failure label).
pub fn record_auth_attempt(status: &'static str, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        counter!("auth_attempts_total", "status" => status).increment(1);
        histogram!("credential_verify_duration_seconds").record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (status, duration_secs);
    }
}

/// Record a forwarded request. `status` is 0 when the upstream was unreachable.
pub fn record_upstream_request(method: &str, status: u16, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        let status_class = match status {
            0 => "error".to_string(),
            s => format!("{}xx", s / 100),
        };
        counter!("upstream_requests_total", "method" => method.to_string(), "status_class" => status_class.clone())
            .increment(1);
        histogram!("upstream_request_duration_seconds", "status_class" => status_class)
            .record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (method, status, duration_secs);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
