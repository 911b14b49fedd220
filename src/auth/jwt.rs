//! JWT credential verification with a static key.

use async_trait::async_trait;
use jsonwebtoken::{
    Algorithm, DecodingKey, Validation, decode, decode_header, errors::ErrorKind,
};
use serde::Deserialize;

use super::{CredentialVerifier, IdentityClaims, Role, VerifyError};
use crate::config::{JwtAlgorithm, JwtAuthConfig, KeyFamily};

/// Claims as issued by the application's login endpoint.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(alias = "userId")]
    sub: String,
    role: Role,
    email: String,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    iat: u64,
    /// Absent `exp` is reported by validation as a missing required claim.
    #[serde(default)]
    exp: Option<u64>,
}

impl TryFrom<TokenClaims> for IdentityClaims {
    type Error = VerifyError;

    fn try_from(claims: TokenClaims) -> Result<Self, Self::Error> {
        let expires_at = claims
            .exp
            .ok_or_else(|| VerifyError::ClaimsRejected("missing exp claim".into()))?;
        Ok(IdentityClaims {
            subject_id: claims.sub,
            role: claims.role,
            email: claims.email,
            permissions: claims.permissions.into_iter().collect(),
            issued_at: claims.iat,
            expires_at,
        })
    }
}

/// Verifies HMAC, RSA or EC signed JWTs against a single configured key.
pub struct JwtVerifier {
    key: DecodingKey,
    allowed_algorithms: Vec<JwtAlgorithm>,
    issuer: Option<String>,
    audience: Option<Vec<String>>,
    leeway_secs: u64,
}

impl JwtVerifier {
    pub fn from_config(config: &JwtAuthConfig) -> Result<Self, VerifyError> {
        let key = match (&config.secret, &config.public_key_pem) {
            (Some(secret), None) => DecodingKey::from_secret(secret.as_bytes()),
            (None, Some(pem)) => {
                let family = config
                    .allowed_algorithms
                    .first()
                    .map(|alg| alg.key_family())
                    .ok_or_else(|| VerifyError::InvalidKey("no algorithms allowed".into()))?;
                let key = match family {
                    KeyFamily::Rsa => DecodingKey::from_rsa_pem(pem.as_bytes()),
                    KeyFamily::Ec => DecodingKey::from_ec_pem(pem.as_bytes()),
                    KeyFamily::Hmac => {
                        return Err(VerifyError::InvalidKey(
                            "public key configured with an HMAC algorithm".into(),
                        ));
                    }
                };
                key.map_err(|e| VerifyError::InvalidKey(e.to_string()))?
            }
            (Some(_), Some(_)) => {
                return Err(VerifyError::InvalidKey(
                    "both secret and public key configured".into(),
                ));
            }
            (None, None) => return Err(VerifyError::MissingKey),
        };

        Ok(Self {
            key,
            allowed_algorithms: config.allowed_algorithms.clone(),
            issuer: config.issuer.clone(),
            audience: config.audience.as_ref().map(|a| a.to_vec()),
            leeway_secs: config.leeway_secs,
        })
    }

    fn is_algorithm_allowed(&self, alg: Algorithm) -> bool {
        self.allowed_algorithms
            .iter()
            .any(|allowed| allowed.matches(alg))
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.leeway = self.leeway_secs;
        validation.set_required_spec_claims(&["exp"]);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(audience),
            None => validation.validate_aud = false,
        }
        validation
    }

    fn decode(&self, token: &str) -> Result<IdentityClaims, VerifyError> {
        let header = decode_header(token).map_err(|e| VerifyError::Malformed(e.to_string()))?;

        // Allowlist is enforced before any signature check.
        if !self.is_algorithm_allowed(header.alg) {
            return Err(VerifyError::AlgorithmNotAllowed(format!("{:?}", header.alg)));
        }

        let data = decode::<TokenClaims>(token, &self.key, &self.validation(header.alg))
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                ErrorKind::InvalidSignature => VerifyError::BadSignature,
                ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience
                | ErrorKind::ImmatureSignature
                | ErrorKind::MissingRequiredClaim(_) => VerifyError::ClaimsRejected(e.to_string()),
                _ => VerifyError::Malformed(e.to_string()),
            })?;

        data.claims.try_into()
    }
}

#[async_trait]
impl CredentialVerifier for JwtVerifier {
    async fn verify(&self, credential: &str) -> Result<IdentityClaims, VerifyError> {
        self.decode(credential)
    }
}
