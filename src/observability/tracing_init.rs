//! Tracing initialization with configurable logging formats.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

/// Initialize the global tracing subscriber.
///
/// Filter precedence: `RUST_LOG`, then `logging.filter` on top of
/// `logging.level`, then `logging.level` with noisy HTTP crates quieted.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), TracingError> {
    let filter = build_env_filter(logging)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match (logging.format, logging.timestamps) {
        (LogFormat::Pretty, true) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_file(logging.file_line)
                    .with_line_number(logging.file_line),
            )
            .try_init(),
        (LogFormat::Pretty, false) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_file(logging.file_line)
                    .with_line_number(logging.file_line)
                    .without_time(),
            )
            .try_init(),
        (LogFormat::Compact, true) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_file(logging.file_line)
                    .with_line_number(logging.file_line),
            )
            .try_init(),
        (LogFormat::Compact, false) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_file(logging.file_line)
                    .with_line_number(logging.file_line)
                    .without_time(),
            )
            .try_init(),
        (LogFormat::Json, true) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_file(logging.file_line)
                    .with_line_number(logging.file_line)
                    .with_current_span(logging.include_spans)
                    .with_span_list(false),
            )
            .try_init(),
        (LogFormat::Json, false) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_file(logging.file_line)
                    .with_line_number(logging.file_line)
                    .with_current_span(logging.include_spans)
                    .with_span_list(false)
                    .without_time(),
            )
            .try_init(),
    };

    result.map_err(|e| TracingError::Init(e.to_string()))
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, TracingError> {
    let base_level = config.level.as_directive();

    if let Ok(env_filter) = std::env::var("RUST_LOG") {
        return Ok(EnvFilter::try_new(env_filter).unwrap_or_else(|_| EnvFilter::new(base_level)));
    }

    let directives = match &config.filter {
        Some(filter) => format!("{base_level},{filter}"),
        None => format!("{base_level},hyper=warn,h2=warn,reqwest=warn,tower_http=info"),
    };
    EnvFilter::try_new(&directives).map_err(|e| TracingError::Filter(directives, e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Failed to initialize tracing: {0}")]
    Init(String),

    #[error("Invalid log filter '{0}': {1}")]
    Filter(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_config_filter_is_applied() {
        temp_env::with_var_unset("RUST_LOG", || {
            let config = LoggingConfig {
                level: LogLevel::Warn,
                filter: Some("medgate=debug".into()),
                ..Default::default()
            };
            let filter = build_env_filter(&config).unwrap().to_string();
            assert!(filter.contains("medgate=debug"), "{filter}");
            assert!(filter.contains("warn"), "{filter}");
        });
    }

    #[test]
    fn test_invalid_config_filter_rejected() {
        temp_env::with_var_unset("RUST_LOG", || {
            let config = LoggingConfig {
                filter: Some("medgate=notalevel".into()),
                ..Default::default()
            };
            assert!(matches!(
                build_env_filter(&config),
                Err(TracingError::Filter(..))
            ));
        });
    }

    #[test]
    fn test_rust_log_overrides_config() {
        temp_env::with_var("RUST_LOG", Some("tower_http=trace"), || {
            let config = LoggingConfig {
                filter: Some("medgate=debug".into()),
                ..Default::default()
            };
            let filter = build_env_filter(&config).unwrap().to_string();
            assert!(filter.contains("tower_http=trace"), "{filter}");
            assert!(!filter.contains("medgate"), "{filter}");
        });
    }
}
