use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

/// Role tag carried by an identity.
///
/// The application knows three roles; anything else is kept verbatim so it
/// can still be forwarded downstream and falls back to the default dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Worker,
    Doctor,
    Admin,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Worker => "worker",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
            Role::Other(role) => role,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "worker" => Role::Worker,
            "doctor" => Role::Doctor,
            "admin" => Role::Admin,
            _ => Role::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(role) => role,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity produced by a [`CredentialVerifier`](super::CredentialVerifier)
/// from a valid credential. Scoped to a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityClaims {
    pub subject_id: String,
    pub role: Role,
    pub email: String,
    pub permissions: BTreeSet<String>,
    /// Unix timestamp, seconds.
    pub issued_at: u64,
    /// Unix timestamp, seconds.
    pub expires_at: u64,
}

impl IdentityClaims {
    /// Any-of check: true if at least one of `required` is held.
    pub fn holds_any(&self, required: &[String]) -> bool {
        required.iter().any(|p| self.permissions.contains(p))
    }
}
