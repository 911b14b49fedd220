use std::collections::BTreeMap;

use axum::response::{IntoResponse, Redirect, Response};

use super::Denial;
use crate::auth::IdentityClaims;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Identity headers attached to an allowed request.
pub type Annotations = BTreeMap<&'static str, String>;

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Continue to the next stage, adding these headers.
    Allow(Annotations),
    /// Send the client to the login page; `return_to` is the requested path.
    RedirectToLogin { login_path: String, return_to: String },
    /// Send the client to a role landing page.
    RedirectToDashboard { path: String },
    /// Refuse with a JSON error.
    Reject(Denial),
}

impl Decision {
    /// Allow without identity headers (exempt paths).
    pub fn allow_anonymous() -> Self {
        Decision::Allow(Annotations::new())
    }

    /// Allow, annotated with the identity's id, role and email.
    pub fn allow_identity(identity: &IdentityClaims) -> Self {
        Decision::Allow(Annotations::from([
            (USER_ID_HEADER, identity.subject_id.clone()),
            (USER_ROLE_HEADER, identity.role.as_str().to_string()),
            (USER_EMAIL_HEADER, identity.email.clone()),
        ]))
    }

    /// Metric label.
    pub fn outcome(&self) -> &'static str {
        match self {
            Decision::Allow(annotations) if annotations.is_empty() => "exempt",
            Decision::Allow(_) => "allow",
            Decision::RedirectToLogin { .. } => "redirect_login",
            Decision::RedirectToDashboard { .. } => "redirect_dashboard",
            Decision::Reject(_) => "reject",
        }
    }

    /// Split into the annotations to apply, or the response to send instead.
    pub fn respond(self) -> Result<Annotations, Response> {
        match self {
            Decision::Allow(annotations) => Ok(annotations),
            Decision::RedirectToLogin {
                login_path,
                return_to,
            } => Err(Redirect::temporary(&login_location(&login_path, &return_to)).into_response()),
            Decision::RedirectToDashboard { path } => {
                Err(Redirect::temporary(&path).into_response())
            }
            Decision::Reject(denial) => Err(denial.into_response()),
        }
    }
}

/// `<login_path>?redirect=<return_to>`, appending to an existing query if present.
fn login_location(login_path: &str, return_to: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("redirect", return_to)
        .finish();
    let separator = if login_path.contains('?') { '&' } else { '?' };
    format!("{login_path}{separator}{query}")
}
