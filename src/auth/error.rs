/// Reasons a credential fails verification.
///
/// The gateway treats every variant the same way (invalid credential); the
/// distinction exists for logs and the `auth_attempts_total` metric.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Malformed credential: {0}")]
    Malformed(String),

    #[error("Credential has expired")]
    Expired,

    #[error("Credential signature is invalid")]
    BadSignature,

    #[error("Signing algorithm {0} is not allowed")]
    AlgorithmNotAllowed(String),

    #[error("Credential claims rejected: {0}")]
    ClaimsRejected(String),

    #[error("Invalid verification key: {0}")]
    InvalidKey(String),

    #[error("No verification key configured")]
    MissingKey,
}

impl VerifyError {
    /// Short label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            VerifyError::Malformed(_) => "malformed",
            VerifyError::Expired => "expired",
            VerifyError::BadSignature => "bad_signature",
            VerifyError::AlgorithmNotAllowed(_) => "algorithm_not_allowed",
            VerifyError::ClaimsRejected(_) => "claims_rejected",
            VerifyError::InvalidKey(_) | VerifyError::MissingKey => "misconfigured",
        }
    }
}
