use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Expected, user-facing reasons a request is turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("Authentication required")]
    MissingCredential,

    #[error("Invalid or expired token")]
    InvalidCredential,

    #[error("Insufficient permissions")]
    InsufficientPermission,
}

impl Denial {
    pub fn status(self) -> StatusCode {
        match self {
            Denial::MissingCredential | Denial::InvalidCredential => StatusCode::UNAUTHORIZED,
            Denial::InsufficientPermission => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
