//! Configuration module for the authorization gateway.
//!
//! The gateway is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Every table built from
//! this configuration is read-only for the lifetime of the process.
//!
//! # Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [auth.jwt]
//! secret = "${MEDGATE_JWT_SECRET}"
//!
//! [upstream]
//! url = "http://127.0.0.1:3000"
//!
//! [access]
//! public_routes = ["/login", "/api/auth/login"]
//!
//! [[access.permissions]]
//! path = "/admin"
//! any_of = ["read:all_users"]
//! ```

mod access;
mod auth;
mod observability;
mod server;

use std::path::Path;

pub use access::*;
pub use auth::*;
pub use observability::*;
use serde::{Deserialize, Serialize};
pub use server::*;

/// Root configuration for the gateway.
///
/// All sections are optional with defaults matching the worker / doctor / admin
/// application, except the JWT key which must be supplied to serve traffic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Credential extraction and verification.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Route classification, permission and dashboard tables.
    #[serde(default)]
    pub access: AccessConfig,

    /// Application that allowed requests are forwarded to.
    /// If omitted, allowed requests receive a 404.
    #[serde(default)]
    pub upstream: Option<UpstreamConfig>,

    /// Observability configuration (logging, metrics).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let mut config: GatewayConfig =
            toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config
            .access
            .matcher
            .resolve_exclude(&config.observability.metrics.path);
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.auth.validate()?;
        self.access.validate()?;
        if let Some(upstream) = &self.upstream {
            upstream.validate()?;
        }
        self.observability.validate()?;

        if !self.access.matcher.intercepts(&self.access.login_path) {
            tracing::warn!(
                login_path = %self.access.login_path,
                "Login path is not intercepted by the matcher; it is reachable without the gateway"
            );
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables appearing after a `#` on the same line are left untouched.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(format!("invalid env pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else { continue };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);

            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = GatewayConfig::from_str("").unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.cookie_name, "auth-token");
        assert_eq!(config.access.api_prefix, "/api");
        assert_eq!(config.access.login_path, "/login");
        assert!(config.upstream.is_none());
        assert_eq!(
            config.access.dashboards.get("worker").map(String::as_str),
            Some("/workers/dashboard")
        );
    }

    #[test]
    fn test_full_config() {
        let config = GatewayConfig::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [auth]
            cookie_name = "session"

            [auth.jwt]
            secret = "s3cret"
            issuer = "records-app"

            [upstream]
            url = "http://localhost:3000"

            [access]
            public_routes = ["/login"]
            auth_only_routes = ["/profile"]
            default_dashboard = "/home"

            [[access.permissions]]
            path = "/admin"
            any_of = ["read:all_users"]

            [[access.permissions]]
            path = "/doctors"
            any_of = ["read:patient_profiles", "write:patient_records"]

            [access.dashboards]
            worker = "/w"
        "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.cookie_name, "session");
        assert_eq!(config.auth.jwt.issuer.as_deref(), Some("records-app"));
        assert_eq!(config.access.permissions.len(), 2);
        assert_eq!(config.access.permissions[1].path, "/doctors");
        assert_eq!(config.access.default_dashboard, "/home");
        // An explicit dashboards table replaces the defaults entirely
        assert_eq!(config.access.dashboards.len(), 1);
        assert_eq!(
            config.upstream.as_ref().map(|u| u.url.as_str()),
            Some("http://localhost:3000")
        );
    }

    #[test]
    fn test_custom_metrics_path_not_intercepted() {
        let config = GatewayConfig::from_str(
            r#"
            [observability.metrics]
            path = "/internal/prom"
        "#,
        )
        .unwrap();

        assert!(!config.access.matcher.intercepts("/internal/prom"));
        assert!(!config.access.matcher.intercepts("/health"));
        assert!(config.access.matcher.intercepts("/metrics"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = GatewayConfig::from_str(
            r#"
            [access]
            public_route = ["/login"]
        "#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Parse(_)), "got {err}");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 7070").unwrap();

        let config = GatewayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 7070);
    }

    #[test]
    fn test_from_missing_file() {
        let err = GatewayConfig::from_file("/nonexistent/medgate.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
        assert!(err.to_string().contains("/nonexistent/medgate.toml"));
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("MEDGATE_TEST_SECRET", Some("hunter2"), || {
            let result = expand_env_vars("secret = \"${MEDGATE_TEST_SECRET}\"").unwrap();
            assert_eq!(result, "secret = \"hunter2\"");
        });
    }

    #[test]
    fn test_env_var_missing() {
        let err = expand_env_vars("secret = \"${MEDGATE_DEFINITELY_UNSET}\"").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotFound(name) if name == "MEDGATE_DEFINITELY_UNSET"));
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# secret = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# secret = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_after_comment_ignored() {
        let result = expand_env_vars("key = \"value\" # ${NONEXISTENT_VAR}").unwrap();
        assert_eq!(result, "key = \"value\" # ${NONEXISTENT_VAR}");
    }

    #[test]
    fn test_multiline_with_comments() {
        temp_env::with_var("MEDGATE_TEST_MULTI", Some("value1"), || {
            let input = r#"key1 = "${MEDGATE_TEST_MULTI}"
# key2 = "${NONEXISTENT}"
key3 = "literal""#;
            let result = expand_env_vars(input).unwrap();
            assert_eq!(
                result,
                r#"key1 = "value1"
# key2 = "${NONEXISTENT}"
key3 = "literal""#
            );
        });
    }

    #[test]
    fn test_env_expansion_feeds_jwt_secret() {
        temp_env::with_var("MEDGATE_TEST_JWT", Some("from-env"), || {
            let config = GatewayConfig::from_str(
                r#"
                [auth.jwt]
                secret = "${MEDGATE_TEST_JWT}"
            "#,
            )
            .unwrap();
            assert_eq!(config.auth.jwt.secret.as_deref(), Some("from-env"));
        });
    }
}
