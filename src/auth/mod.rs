//! Credential extraction and verification.
//!
//! The gateway only needs two things from this module: find the credential on
//! a request ([`CredentialExtractor`]) and turn it into an identity
//! ([`CredentialVerifier`]). [`JwtVerifier`] is the bundled verifier.

mod error;
mod extract;
mod identity;
#[cfg(feature = "jwt")]
mod jwt;
mod verifier;

pub use error::VerifyError;
pub use extract::{CredentialExtractor, CredentialSource};
pub use identity::{IdentityClaims, Role};
#[cfg(feature = "jwt")]
pub use jwt::JwtVerifier;
#[cfg(test)]
pub(crate) use verifier::test_support;
pub use verifier::CredentialVerifier;
