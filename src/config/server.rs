use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request body size limit in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Overall request timeout in seconds. The gateway itself never cancels a
    /// decision; this bounds the whole request including the upstream call.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ServerConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "server.timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    10 * 1024 * 1024 // 10 MB
}

fn default_timeout() -> u64 {
    60
}

/// The application behind the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Base URL that allowed requests are forwarded to (path and query are appended).
    pub url: String,

    /// Timeout for a single upstream call in seconds.
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.url).map_err(|e| {
            ConfigError::Validation(format!("upstream.url '{}' is invalid: {e}", self.url))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "upstream.url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        Ok(())
    }
}

fn default_upstream_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_url_validation() {
        let ok = UpstreamConfig {
            url: "https://records.internal:8443".into(),
            timeout_secs: 5,
        };
        assert!(ok.validate().is_ok());

        let bad_scheme = UpstreamConfig {
            url: "ftp://records.internal".into(),
            timeout_secs: 5,
        };
        assert!(bad_scheme.validate().is_err());

        let garbage = UpstreamConfig {
            url: "not a url".into(),
            timeout_secs: 5,
        };
        assert!(garbage.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ServerConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
