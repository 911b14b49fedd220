//! The decision engine.
//!
//! [`Gateway::evaluate`] is a single pass over one request:
//!
//! 1. exempt paths (framework assets, static files, public routes) are allowed;
//! 2. a missing credential is rejected (API paths) or sent to login (pages);
//! 3. an invalid credential is handled the same way with a different message;
//! 4. auth-only paths and paths with no required permission are allowed;
//! 5. otherwise the identity must hold one of the resolved permissions, or the
//!    request is rejected (API) or sent to the role's dashboard (pages).
//!
//! The engine holds no per-request state and never mutates its tables.

mod decision;
mod error;

use std::{collections::HashMap, sync::Arc, time::Instant};

pub use decision::{
    Annotations, Decision, USER_EMAIL_HEADER, USER_ID_HEADER, USER_ROLE_HEADER,
};
pub use error::Denial;
use http::HeaderMap;

use crate::{
    auth::CredentialVerifier,
    authz::{AccessPolicy, Exemption, RouteClass},
    observability::metrics,
};

/// The parts of an inbound request the gateway looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'a> {
    pub path: &'a str,
    pub headers: &'a HeaderMap,
    pub cookies: &'a HashMap<String, String>,
}

/// Decision engine: immutable policy plus a credential verifier.
#[derive(Clone)]
pub struct Gateway {
    policy: Arc<AccessPolicy>,
    verifier: Arc<dyn CredentialVerifier>,
}

impl Gateway {
    pub fn new(policy: AccessPolicy, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            policy: Arc::new(policy),
            verifier,
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    pub async fn evaluate(&self, request: &RequestParts<'_>) -> Decision {
        let policy = &*self.policy;
        let path = request.path;

        if let Exemption::Exempt(reason) = policy.classifier().classify(path) {
            tracing::trace!(path, ?reason, "Exempt path");
            return Decision::allow_anonymous();
        }

        let is_api = policy.is_api_path(path);

        let Some(credential) = policy
            .extractor()
            .extract(request.headers, request.cookies)
        else {
            tracing::debug!(path, "No credential presented");
            return self.unauthenticated(path, is_api, Denial::MissingCredential);
        };

        let started = Instant::now();
        let identity = match self.verifier.verify(credential).await {
            Ok(identity) => {
                metrics::record_auth_attempt("success", started.elapsed().as_secs_f64());
                identity
            }
            Err(e) => {
                metrics::record_auth_attempt(e.as_label(), started.elapsed().as_secs_f64());
                tracing::debug!(path, error = %e, "Credential rejected");
                return self.unauthenticated(path, is_api, Denial::InvalidCredential);
            }
        };

        if policy.classifier().routes().classify(path) == RouteClass::AuthOnly {
            return Decision::allow_identity(&identity);
        }

        let resolution = policy.resolver().resolve(path);
        if resolution.is_open() || identity.holds_any(resolution.required) {
            return Decision::allow_identity(&identity);
        }

        tracing::debug!(
            path,
            subject = %identity.subject_id,
            role = %identity.role,
            required = ?resolution.required,
            resolved_by = ?resolution.resolved_by,
            "Insufficient permissions"
        );
        if is_api {
            Decision::Reject(Denial::InsufficientPermission)
        } else {
            Decision::RedirectToDashboard {
                path: policy.dashboard_for(&identity.role).to_string(),
            }
        }
    }

    fn unauthenticated(&self, path: &str, is_api: bool, denial: Denial) -> Decision {
        if is_api {
            Decision::Reject(denial)
        } else {
            Decision::RedirectToLogin {
                login_path: self.policy.login_path().to_string(),
                return_to: path.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use http::{HeaderValue, header::AUTHORIZATION};
    use rstest::rstest;

    use super::*;
    use crate::{
        auth::test_support::{StaticVerifier, identity},
        config::{AccessConfig, AuthConfig, PermissionRule},
    };

    fn access() -> AccessConfig {
        AccessConfig {
            public_routes: vec!["/login".into(), "/api/auth/login".into(), "/open".into()],
            auth_only_routes: vec!["/profile".into(), "/api/auth/me".into()],
            permissions: vec![
                PermissionRule::new("/admin", &["read:all_users"]),
                PermissionRule::new("/doctors", &["read:patient_profiles"]),
                PermissionRule::new("/workers/dashboard", &["read:own_profile"]),
                PermissionRule::new("/api/admin/stats", &["read:all_users", "read:stats"]),
            ],
            ..Default::default()
        }
    }

    fn verifier() -> StaticVerifier {
        StaticVerifier::default()
            .with(
                "worker-token",
                identity("w-1", "worker", &["read:own_profile", "read:own_documents"]),
            )
            .with(
                "doctor-token",
                identity(
                    "d-1",
                    "doctor",
                    &["read:patient_profiles", "read:patient_documents"],
                ),
            )
            .with("admin-token", identity("a-1", "admin", &["read:all_users"]))
            .with("nurse-token", identity("n-1", "nurse", &[]))
    }

    fn gateway() -> Gateway {
        Gateway::new(
            AccessPolicy::from_config(&access(), &AuthConfig::default()),
            Arc::new(verifier()),
        )
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    async fn eval(gateway: &Gateway, path: &str, token: Option<&str>) -> Decision {
        let headers = token.map(bearer).unwrap_or_default();
        let cookies = HashMap::new();
        gateway
            .evaluate(&RequestParts {
                path,
                headers: &headers,
                cookies: &cookies,
            })
            .await
    }

    fn login(return_to: &str) -> Decision {
        Decision::RedirectToLogin {
            login_path: "/login".into(),
            return_to: return_to.into(),
        }
    }

    #[rstest]
    #[case("/_next/static/chunks/app.js")]
    #[case("/logo.svg")]
    #[case("/login")]
    #[case("/api/auth/login")]
    #[case("/openings")]
    #[tokio::test]
    async fn test_exempt_paths_allowed_regardless_of_credential(#[case] path: &str) {
        let g = gateway();
        for token in [None, Some("garbage"), Some("worker-token")] {
            assert_eq!(
                eval(&g, path, token).await,
                Decision::allow_anonymous(),
                "{path} with {token:?}"
            );
        }
    }

    #[rstest]
    #[case("/api/workers/42")]
    #[case("/api/admin/stats")]
    #[case("/api/auth/me")]
    #[tokio::test]
    async fn test_api_without_credential(#[case] path: &str) {
        assert_eq!(
            eval(&gateway(), path, None).await,
            Decision::Reject(Denial::MissingCredential)
        );
    }

    #[tokio::test]
    async fn test_api_with_invalid_credential() {
        assert_eq!(
            eval(&gateway(), "/api/workers/42", Some("forged")).await,
            Decision::Reject(Denial::InvalidCredential)
        );
    }

    #[rstest]
    #[case("/admin/users", None)]
    #[case("/workers/dashboard", Some("forged"))]
    #[case("/profile", None)]
    #[tokio::test]
    async fn test_pages_redirect_to_login(#[case] path: &str, #[case] token: Option<&str>) {
        assert_eq!(eval(&gateway(), path, token).await, login(path));
    }

    #[tokio::test]
    async fn test_cookie_credential() {
        let headers = HeaderMap::new();
        let cookies = HashMap::from([("auth-token".to_string(), "admin-token".to_string())]);
        let decision = gateway()
            .evaluate(&RequestParts {
                path: "/admin",
                headers: &headers,
                cookies: &cookies,
            })
            .await;
        assert_eq!(outcome_subject(&decision), Some("a-1"));
    }

    fn outcome_subject(decision: &Decision) -> Option<&str> {
        match decision {
            Decision::Allow(annotations) => annotations.get(USER_ID_HEADER).map(String::as_str),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_allow_carries_exactly_three_identity_headers() {
        let decision = eval(&gateway(), "/doctors/patients", Some("doctor-token")).await;
        let Decision::Allow(annotations) = decision else {
            panic!("expected allow, got {decision:?}");
        };
        assert_eq!(
            annotations,
            Annotations::from([
                (USER_ID_HEADER, "d-1".to_string()),
                (USER_ROLE_HEADER, "doctor".to_string()),
                (USER_EMAIL_HEADER, "d-1@example.com".to_string()),
            ])
        );
    }

    #[tokio::test]
    async fn test_auth_only_route_needs_no_permission() {
        let decision = eval(&gateway(), "/api/auth/me", Some("nurse-token")).await;
        assert_eq!(outcome_subject(&decision), Some("n-1"));

        let decision = eval(&gateway(), "/profile/settings", Some("nurse-token")).await;
        assert_eq!(outcome_subject(&decision), Some("n-1"));
    }

    #[tokio::test]
    async fn test_unmatched_path_needs_only_authentication() {
        let decision = eval(&gateway(), "/", Some("nurse-token")).await;
        assert_eq!(outcome_subject(&decision), Some("n-1"));

        let decision = eval(&gateway(), "/api/settings", Some("nurse-token")).await;
        assert_eq!(outcome_subject(&decision), Some("n-1"));
    }

    #[tokio::test]
    async fn test_api_insufficient_permission() {
        assert_eq!(
            eval(&gateway(), "/api/admin/stats", Some("worker-token")).await,
            Decision::Reject(Denial::InsufficientPermission)
        );
    }

    #[rstest]
    #[case("worker-token", "/admin", "/workers/dashboard")]
    #[case("doctor-token", "/admin/users", "/doctors")]
    #[case("admin-token", "/doctors", "/admin")]
    #[case("nurse-token", "/workers/dashboard", "/")]
    #[tokio::test]
    async fn test_pages_redirect_to_role_dashboard(
        #[case] token: &str,
        #[case] path: &str,
        #[case] dashboard: &str,
    ) {
        assert_eq!(
            eval(&gateway(), path, Some(token)).await,
            Decision::RedirectToDashboard {
                path: dashboard.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_structural_rules_apply_to_api_subtrees() {
        let g = gateway();

        // Documents need a documents permission
        let decision = eval(&g, "/api/workers/42/documents", Some("worker-token")).await;
        assert_eq!(outcome_subject(&decision), Some("w-1"));
        let decision = eval(&g, "/api/workers/42/documents", Some("doctor-token")).await;
        assert_eq!(outcome_subject(&decision), Some("d-1"));
        assert_eq!(
            eval(&g, "/api/workers/42/documents", Some("admin-token")).await,
            Decision::Reject(Denial::InsufficientPermission)
        );

        // Admin subtree
        assert_eq!(
            eval(&g, "/api/admin/users", Some("doctor-token")).await,
            Decision::Reject(Denial::InsufficientPermission)
        );
        let decision = eval(&g, "/api/admin/users", Some("admin-token")).await;
        assert_eq!(outcome_subject(&decision), Some("a-1"));
    }

    #[tokio::test]
    async fn test_exact_entry_beats_structural_rule() {
        // `/api/admin/stats` is in the table with `read:stats` as an alternative
        let g = Gateway::new(
            AccessPolicy::from_config(&access(), &AuthConfig::default()),
            Arc::new(
                StaticVerifier::default()
                    .with("stats-token", identity("s-1", "analyst", &["read:stats"])),
            ),
        );
        let decision = eval(&g, "/api/admin/stats", Some("stats-token")).await;
        assert_eq!(outcome_subject(&decision), Some("s-1"));

        // Other admin paths still use the structural rule
        assert_eq!(
            eval(&g, "/api/admin/users", Some("stats-token")).await,
            Decision::Reject(Denial::InsufficientPermission)
        );
    }

    #[tokio::test]
    async fn test_evaluation_is_idempotent() {
        let g = gateway();
        for (path, token) in [
            ("/admin", Some("worker-token")),
            ("/api/workers/1/documents", Some("doctor-token")),
            ("/api/admin/stats", None),
            ("/doctors", Some("forged")),
        ] {
            let first = eval(&g, path, token).await;
            let second = eval(&g, path, token).await;
            assert_eq!(first, second, "{path}");
        }
    }

    #[tokio::test]
    async fn test_concurrent_evaluations_are_independent() {
        let g = gateway();
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..64 {
            let g = g.clone();
            tasks.spawn(async move {
                let (token, path) = if i % 2 == 0 {
                    ("admin-token", "/api/admin/stats")
                } else {
                    ("worker-token", "/api/admin/stats")
                };
                (i, eval(&g, path, Some(token)).await)
            });
        }

        while let Some(result) = tasks.join_next().await {
            let (i, decision) = result.unwrap();
            if i % 2 == 0 {
                assert_eq!(outcome_subject(&decision), Some("a-1"));
            } else {
                assert_eq!(decision, Decision::Reject(Denial::InsufficientPermission));
            }
        }
    }
}
