use std::fmt;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Authentication configuration: where credentials come from and how they are verified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Cookie consulted when no `Authorization: Bearer` header is present.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// JWT verification settings.
    #[serde(default)]
    pub jwt: JwtAuthConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            jwt: JwtAuthConfig::default(),
        }
    }
}

impl AuthConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.cookie_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "auth.cookie_name cannot be empty".into(),
            ));
        }
        self.jwt.validate()
    }
}

fn default_cookie_name() -> String {
    "auth-token".to_string()
}

/// JWT verification configuration.
///
/// Exactly one of `secret` (HMAC) or `public_key_pem` (RSA / EC) is needed to
/// serve traffic. Leaving both unset is accepted so that offline commands such
/// as `explain` work without key material.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JwtAuthConfig {
    /// Shared HMAC secret.
    #[serde(default)]
    pub secret: Option<String>,

    /// PEM-encoded public key for asymmetric algorithms.
    #[serde(default)]
    pub public_key_pem: Option<String>,

    /// Expected issuer (iss claim). Not checked when unset.
    #[serde(default)]
    pub issuer: Option<String>,

    /// Expected audience (aud claim). Not checked when unset.
    #[serde(default)]
    pub audience: Option<OneOrMany<String>>,

    /// Clock skew tolerance for the expiry check, in seconds.
    #[serde(default)]
    pub leeway_secs: u64,

    /// Allowed JWT signing algorithms.
    #[serde(default = "default_allowed_algorithms")]
    pub allowed_algorithms: Vec<JwtAlgorithm>,
}

impl Default for JwtAuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            public_key_pem: None,
            issuer: None,
            audience: None,
            leeway_secs: 0,
            allowed_algorithms: default_allowed_algorithms(),
        }
    }
}

impl fmt::Debug for JwtAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtAuthConfig")
            .field("secret", &self.secret.as_ref().map(|_| "****"))
            .field("public_key_pem", &self.public_key_pem.is_some())
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_secs", &self.leeway_secs)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .finish()
    }
}

impl JwtAuthConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_some() && self.public_key_pem.is_some() {
            return Err(ConfigError::Validation(
                "auth.jwt: set either secret or public_key_pem, not both".into(),
            ));
        }
        if self.secret.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::Validation(
                "auth.jwt.secret cannot be empty".into(),
            ));
        }
        if self.allowed_algorithms.is_empty() {
            return Err(ConfigError::Validation(
                "At least one JWT algorithm must be allowed".into(),
            ));
        }

        let has_hmac = self.allowed_algorithms.iter().any(|a| a.is_hmac());
        let has_asymmetric = self.allowed_algorithms.iter().any(|a| !a.is_hmac());
        if self.secret.is_some() && has_asymmetric {
            return Err(ConfigError::Validation(
                "auth.jwt.secret can only be used with HS256/HS384/HS512".into(),
            ));
        }
        if self.public_key_pem.is_some() && has_hmac {
            return Err(ConfigError::Validation(
                "auth.jwt.public_key_pem cannot be used with HMAC algorithms".into(),
            ));
        }
        if self.public_key_pem.is_some() {
            let families: std::collections::HashSet<_> =
                self.allowed_algorithms.iter().map(|a| a.key_family()).collect();
            if families.len() > 1 {
                return Err(ConfigError::Validation(
                    "auth.jwt.allowed_algorithms mixes RSA and EC algorithms for a single public key"
                        .into(),
                ));
            }
        }
        Ok(())
    }
}

/// JWT signing algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JwtAlgorithm {
    /// HMAC with SHA-256
    HS256,
    /// HMAC with SHA-384
    HS384,
    /// HMAC with SHA-512
    HS512,
    /// RSA with SHA-256
    RS256,
    /// RSA with SHA-384
    RS384,
    /// RSA with SHA-512
    RS512,
    /// RSA-PSS with SHA-256
    PS256,
    /// ECDSA with P-256 and SHA-256
    ES256,
    /// ECDSA with P-384 and SHA-384
    ES384,
}

/// Which kind of key an algorithm verifies with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    Hmac,
    Rsa,
    Ec,
}

impl JwtAlgorithm {
    pub fn key_family(self) -> KeyFamily {
        match self {
            JwtAlgorithm::HS256 | JwtAlgorithm::HS384 | JwtAlgorithm::HS512 => KeyFamily::Hmac,
            JwtAlgorithm::RS256
            | JwtAlgorithm::RS384
            | JwtAlgorithm::RS512
            | JwtAlgorithm::PS256 => KeyFamily::Rsa,
            JwtAlgorithm::ES256 | JwtAlgorithm::ES384 => KeyFamily::Ec,
        }
    }

    pub fn is_hmac(self) -> bool {
        self.key_family() == KeyFamily::Hmac
    }

    /// Convert to jsonwebtoken Algorithm.
    #[cfg(feature = "jwt")]
    pub fn to_jwt_algorithm(self) -> jsonwebtoken::Algorithm {
        match self {
            JwtAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            JwtAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            JwtAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
            JwtAlgorithm::RS256 => jsonwebtoken::Algorithm::RS256,
            JwtAlgorithm::RS384 => jsonwebtoken::Algorithm::RS384,
            JwtAlgorithm::RS512 => jsonwebtoken::Algorithm::RS512,
            JwtAlgorithm::PS256 => jsonwebtoken::Algorithm::PS256,
            JwtAlgorithm::ES256 => jsonwebtoken::Algorithm::ES256,
            JwtAlgorithm::ES384 => jsonwebtoken::Algorithm::ES384,
        }
    }

    /// Check if this algorithm matches a jsonwebtoken Algorithm.
    #[cfg(feature = "jwt")]
    pub fn matches(self, alg: jsonwebtoken::Algorithm) -> bool {
        self.to_jwt_algorithm() == alg
    }
}

fn default_allowed_algorithms() -> Vec<JwtAlgorithm> {
    vec![JwtAlgorithm::HS256]
}

/// A value that can be either a single item or a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v.clone()],
            OneOrMany::Many(v) => v.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hmac_config() -> JwtAuthConfig {
        JwtAuthConfig {
            secret: Some("top-secret-value".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_jwt_config_debug_redacts_secret() {
        let debug_output = format!("{:?}", hmac_config());
        assert!(debug_output.contains("****"));
        assert!(
            !debug_output.contains("top-secret-value"),
            "Debug output must NOT contain the secret"
        );
    }

    #[test]
    fn test_no_key_is_valid() {
        let config = JwtAuthConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_both_keys_rejected() {
        let config = JwtAuthConfig {
            public_key_pem: Some("-----BEGIN PUBLIC KEY-----".into()),
            ..hmac_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("not both"));
    }

    #[test]
    fn test_secret_with_asymmetric_algorithm_rejected() {
        let config = JwtAuthConfig {
            allowed_algorithms: vec![JwtAlgorithm::HS256, JwtAlgorithm::RS256],
            ..hmac_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_public_key_with_hmac_rejected() {
        let config = JwtAuthConfig {
            public_key_pem: Some("pem".into()),
            allowed_algorithms: vec![JwtAlgorithm::HS256],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_public_key_mixed_families_rejected() {
        let config = JwtAuthConfig {
            public_key_pem: Some("pem".into()),
            allowed_algorithms: vec![JwtAlgorithm::RS256, JwtAlgorithm::ES256],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_algorithms_rejected() {
        let config = JwtAuthConfig {
            allowed_algorithms: vec![],
            ..hmac_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_audience_one_or_many() {
        let one: JwtAuthConfig = toml::from_str(r#"audience = "records""#).unwrap();
        assert_eq!(one.audience.unwrap().to_vec(), vec!["records"]);

        let many: JwtAuthConfig = toml::from_str(r#"audience = ["a", "b"]"#).unwrap();
        assert_eq!(many.audience.unwrap().to_vec(), vec!["a", "b"]);
    }

    #[cfg(feature = "jwt")]
    #[test]
    fn test_jwt_algorithm_matches() {
        assert!(JwtAlgorithm::HS256.matches(jsonwebtoken::Algorithm::HS256));
        assert!(!JwtAlgorithm::HS256.matches(jsonwebtoken::Algorithm::HS384));
        assert!(JwtAlgorithm::ES256.matches(jsonwebtoken::Algorithm::ES256));
    }
}
