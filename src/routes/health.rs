use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::AppState;
#[cfg(feature = "prometheus")]
use crate::observability::metrics::get_prometheus_handle;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Whether allowed requests have somewhere to go.
    pub upstream_configured: bool,
}

/// Health summary. Never intercepted by the gateway under the default matcher.
#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        upstream_configured: state.config.upstream.is_some(),
    })
}

/// Liveness probe.
#[tracing::instrument(name = "health.liveness")]
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}

/// Prometheus metrics endpoint.
///
/// Returns metrics in Prometheus text format.
#[tracing::instrument(name = "health.metrics")]
pub async fn metrics() -> impl IntoResponse {
    #[cfg(feature = "prometheus")]
    {
        match get_prometheus_handle() {
            Some(handle) => (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            ),
            None => (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            ),
        }
    }
    #[cfg(not(feature = "prometheus"))]
    (
        StatusCode::NOT_FOUND,
        [("content-type", "text/plain")],
        "Prometheus metrics not enabled".to_string(),
    )
}
