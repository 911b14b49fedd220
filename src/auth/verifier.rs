use async_trait::async_trait;

use super::{IdentityClaims, VerifyError};

/// Validates a raw credential and yields the identity it carries.
///
/// Implementations must reject malformed, expired and signature-invalid
/// credentials. The gateway treats any error as terminal for the request.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<IdentityClaims, VerifyError>;
}
