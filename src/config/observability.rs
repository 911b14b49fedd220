use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Observability configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ObservabilityConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        self.metrics.validate()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include timestamps.
    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Include file/line information.
    #[serde(default)]
    pub file_line: bool,

    /// Include span information (request id, path) in each event.
    #[serde(default = "default_true")]
    pub include_spans: bool,

    /// Filter directives (e.g., "medgate=debug,tower_http=warn").
    /// Overrides `level` when set; `RUST_LOG` overrides both.
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            timestamps: true,
            file_line: false,
            include_spans: true,
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable multi-line format.
    Pretty,
    /// Compact single-line format.
    #[default]
    Compact,
    /// JSON format (for log aggregation).
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// Metrics
// ─────────────────────────────────────────────────────────────────────────────

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Expose the Prometheus endpoint. Ignored without the `prometheus` feature.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path the Prometheus endpoint is served on.
    #[serde(default = "default_metrics_path")]
    pub path: String,

    /// Histogram buckets for credential verification latency (in milliseconds).
    #[serde(default = "default_latency_buckets")]
    pub latency_buckets_ms: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
            latency_buckets_ms: default_latency_buckets(),
        }
    }
}

impl MetricsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "observability.metrics.path must start with '/', got '{}'",
                self.path
            )));
        }
        if self.latency_buckets_ms.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::Validation(
                "observability.metrics.latency_buckets_ms must be strictly increasing".into(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

pub(super) fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_latency_buckets() -> Vec<f64> {
    vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0]
}
