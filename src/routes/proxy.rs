//! Forwards allowed requests to the upstream application.

use std::time::Instant;

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{AppState, observability::metrics};

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Fallback handler: stream the request to `[upstream]` and the response back.
pub async fn forward(State(state): State<AppState>, req: Request) -> Response {
    let Some(upstream) = &state.config.upstream else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response();
    };

    let (parts, body) = req.into_parts();
    let target = match upstream_url(&upstream.url, &parts.uri) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build upstream URL");
            return upstream_unavailable();
        }
    };

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    let started = Instant::now();
    let result = state
        .http_client
        .request(parts.method.clone(), target)
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await;
    let elapsed = started.elapsed().as_secs_f64();

    let upstream_response = match result {
        Ok(response) => response,
        Err(e) => {
            metrics::record_upstream_request(parts.method.as_str(), 0, elapsed);
            tracing::warn!(error = %e, method = %parts.method, path = %parts.uri.path(), "Upstream request failed");
            return upstream_unavailable();
        }
    };

    let status = upstream_response.status();
    metrics::record_upstream_request(parts.method.as_str(), status.as_u16(), elapsed);

    let mut response_headers = upstream_response.headers().clone();
    strip_hop_by_hop(&mut response_headers);

    let mut response = Response::new(Body::from_stream(upstream_response.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}

fn upstream_unavailable() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "error": "Upstream unavailable" })),
    )
        .into_response()
}

/// Upstream base URL with the inbound path and query appended.
fn upstream_url(base: &str, uri: &Uri) -> Result<reqwest::Url, url::ParseError> {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    reqwest::Url::parse(&format!("{}{path_and_query}", base.trim_end_matches('/')))
}

/// Remove hop-by-hop headers, including any named in `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in HOP_BY_HOP.iter().copied().chain(listed.iter().map(String::as_str)) {
        headers.remove(name);
    }
}
