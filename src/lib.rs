//! medgate: request authorization gateway for multi-role health record applications.
//!
//! Every inbound request is classified, its bearer credential verified, and the
//! permissions required for its path resolved before anything downstream runs.
//! The outcome is a [`gateway::Decision`]: allow (with identity headers), redirect
//! to login or to a role dashboard, or reject with a JSON error.

use std::{sync::Arc, time::Duration};

use axum::{Router, http::StatusCode, routing::get};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub mod auth;
pub mod authz;
pub mod config;
pub mod gateway;
pub mod middleware;
pub mod observability;
pub mod routes;

#[cfg(test)]
mod tests;

use crate::{auth::CredentialVerifier, gateway::Gateway};

/// Shared state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::GatewayConfig>,
    /// The decision engine. Cheap to clone; tables are behind an `Arc`.
    pub gateway: Gateway,
    /// Client used to forward allowed requests to the upstream application.
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Build state from a loaded config and a credential verifier.
    pub fn new(
        config: config::GatewayConfig,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Result<Self, reqwest::Error> {
        let gateway = Gateway::new(
            authz::AccessPolicy::from_config(&config.access, &config.auth),
            verifier,
        );

        let mut client = reqwest::Client::builder();
        if let Some(upstream) = &config.upstream {
            client = client.timeout(Duration::from_secs(upstream.timeout_secs));
        }

        Ok(Self {
            config: Arc::new(config),
            gateway,
            http_client: client.build()?,
        })
    }

    /// Build state with the JWT verifier configured in `[auth.jwt]`.
    #[cfg(feature = "jwt")]
    pub fn with_jwt(config: config::GatewayConfig) -> Result<Self, StateError> {
        let verifier = auth::JwtVerifier::from_config(&config.auth.jwt)?;
        Ok(Self::new(config, Arc::new(verifier))?)
    }
}

/// Errors raised while assembling [`AppState`].
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to build credential verifier: {0}")]
    Verifier(#[from] auth::VerifyError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Assemble the router: health and metrics endpoints, the upstream forwarder as
/// fallback, and the gateway in front of all of it.
pub fn build_app(config: &config::GatewayConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness));

    if config.observability.metrics.enabled {
        app = app.route(
            &config.observability.metrics.path,
            get(routes::health::metrics),
        );
    }

    // Layers run bottom-up: body limit, trace, timeout, request id, cookies, gateway.
    app.fallback(routes::proxy::forward)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::gateway_middleware,
        ))
        .layer(tower_cookies::CookieManagerLayer::new())
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.server.timeout_secs),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .with_state(state)
}
