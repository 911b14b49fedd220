//! Gateway middleware: runs the decision engine in front of every intercepted route.

use std::collections::HashMap;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    AppState,
    gateway::{Annotations, RequestParts, USER_EMAIL_HEADER, USER_ID_HEADER, USER_ROLE_HEADER},
    observability::metrics,
};

/// Identity headers only the gateway may set.
const IDENTITY_HEADERS: [&str; 3] = [USER_ID_HEADER, USER_ROLE_HEADER, USER_EMAIL_HEADER];

/// Strips client-supplied identity headers, then evaluates the request if the
/// matcher intercepts its path. Allowed requests continue with the identity
/// headers attached; everything else is answered here.
pub async fn gateway_middleware(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Response {
    strip_identity_headers(req.headers_mut());

    if !state.config.access.matcher.intercepts(req.uri().path()) {
        return next.run(req).await;
    }

    let cookie_map: HashMap<String, String> = cookies
        .list()
        .into_iter()
        .map(|c| (c.name().to_string(), c.value().to_string()))
        .collect();

    let (mut parts, body) = req.into_parts();
    let decision = state
        .gateway
        .evaluate(&RequestParts {
            path: parts.uri.path(),
            headers: &parts.headers,
            cookies: &cookie_map,
        })
        .await;

    let outcome = decision.outcome();
    metrics::record_gateway_decision(outcome);
    tracing::debug!(path = %parts.uri.path(), outcome, "Gateway decision");

    match decision.respond() {
        Ok(annotations) => {
            apply_annotations(&mut parts.headers, annotations);
            next.run(Request::from_parts(parts, body)).await
        }
        Err(response) => response,
    }
}

fn strip_identity_headers(headers: &mut HeaderMap) {
    for name in IDENTITY_HEADERS {
        headers.remove(name);
    }
}

fn apply_annotations(headers: &mut HeaderMap, annotations: Annotations) {
    for (name, value) in annotations {
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(name), value);
            }
            Err(_) => {
                tracing::warn!(header = name, "Identity value is not a valid header value; skipped");
            }
        }
    }
}
