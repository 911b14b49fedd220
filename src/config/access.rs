//! Access policy tables: route classification, permissions and dashboards.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{ConfigError, observability::default_metrics_path};
use crate::authz::pattern_matches;

/// Access policy configuration.
///
/// All matching against these tables is plain string equality or raw string
/// prefix, so `/workers` also matches `/workersX`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    /// Paths starting with this prefix get JSON errors instead of redirects.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Where unauthenticated page requests are sent.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Paths (exact or prefix) reachable without any credential.
    #[serde(default = "default_public_routes")]
    pub public_routes: Vec<String>,

    /// Paths (exact or prefix) that need a valid identity but no permission.
    #[serde(default = "default_auth_only_routes")]
    pub auth_only_routes: Vec<String>,

    /// Landing path for roles missing from `dashboards`.
    #[serde(default = "default_dashboard")]
    pub default_dashboard: String,

    /// Permission table, in declaration order. Order matters for prefix matching.
    #[serde(default = "default_permissions")]
    pub permissions: Vec<PermissionRule>,

    /// Role → landing path used when a page request lacks permission.
    #[serde(default = "default_dashboards")]
    pub dashboards: BTreeMap<String, String>,

    /// Static asset detection.
    #[serde(default)]
    pub static_assets: StaticAssetsConfig,

    /// Which inbound paths the gateway intercepts at all.
    #[serde(default)]
    pub matcher: MatcherConfig,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            api_prefix: default_api_prefix(),
            login_path: default_login_path(),
            public_routes: default_public_routes(),
            auth_only_routes: default_auth_only_routes(),
            default_dashboard: default_dashboard(),
            permissions: default_permissions(),
            dashboards: default_dashboards(),
            static_assets: StaticAssetsConfig::default(),
            matcher: MatcherConfig::default(),
        }
    }
}

impl AccessConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.api_prefix.len() < 2 || !self.api_prefix.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "access.api_prefix must be a non-root path starting with '/', got '{}'",
                self.api_prefix
            )));
        }
        require_path("access.login_path", &self.login_path)?;
        require_path("access.default_dashboard", &self.default_dashboard)?;

        for route in &self.public_routes {
            require_path("access.public_routes", route)?;
        }
        for route in &self.auth_only_routes {
            require_path("access.auth_only_routes", route)?;
        }
        for (role, path) in &self.dashboards {
            require_path(&format!("access.dashboards.{role}"), path)?;
        }

        let mut seen = HashSet::new();
        for rule in &self.permissions {
            require_path("access.permissions.path", &rule.path)?;
            if rule.any_of.iter().any(|p| p.trim().is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "access.permissions entry '{}' contains an empty permission",
                    rule.path
                )));
            }
            if !seen.insert(rule.path.as_str()) {
                tracing::warn!(
                    path = %rule.path,
                    "Duplicate permission entry; the first declaration wins"
                );
            }
        }

        // A public login page would never be reached otherwise.
        if !self
            .public_routes
            .iter()
            .any(|r| self.login_path.starts_with(r.as_str()))
        {
            tracing::warn!(
                login_path = %self.login_path,
                "Login path is not a public route; unauthenticated users will loop on redirects"
            );
        }

        self.static_assets.validate()
    }
}

fn require_path(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{field} entries must start with '/', got '{value}'"
        )))
    }
}

/// One permission table entry: requests to `path` need at least one of `any_of`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionRule {
    pub path: String,

    /// Empty means authenticated-only.
    #[serde(default)]
    pub any_of: Vec<String>,
}

impl PermissionRule {
    pub fn new(path: &str, any_of: &[&str]) -> Self {
        Self {
            path: path.to_string(),
            any_of: any_of.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Static asset detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticAssetsConfig {
    /// Substrings marking framework-internal paths (e.g. "/_next/").
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,

    /// File extensions served as public assets.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for StaticAssetsConfig {
    fn default() -> Self {
        Self {
            markers: default_markers(),
            extensions: default_extensions(),
        }
    }
}

impl StaticAssetsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ext) = self.extensions.iter().find(|e| !e.starts_with('.') || e.len() < 2) {
            return Err(ConfigError::Validation(format!(
                "access.static_assets.extensions entries must look like '.css', got '{ext}'"
            )));
        }
        if self.markers.iter().any(|m| m.is_empty()) {
            return Err(ConfigError::Validation(
                "access.static_assets.markers cannot contain empty strings".into(),
            ));
        }
        Ok(())
    }
}

/// Path patterns selecting which requests reach the gateway.
///
/// Patterns use `*` (anything), `prefix*` or an exact path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatcherConfig {
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// When omitted: `/health*` and the configured metrics path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: None,
        }
    }
}

impl MatcherConfig {
    /// True if requests to `path` go through the gateway.
    pub fn intercepts(&self, path: &str) -> bool {
        if !self.include.iter().any(|p| pattern_matches(p, path)) {
            return false;
        }
        match &self.exclude {
            Some(exclude) => !exclude.iter().any(|p| pattern_matches(p, path)),
            None => !default_exclude(&default_metrics_path())
                .iter()
                .any(|p| pattern_matches(p, path)),
        }
    }

    /// Fill an omitted `exclude` list with the defaults for this metrics path.
    pub(super) fn resolve_exclude(&mut self, metrics_path: &str) {
        if self.exclude.is_none() {
            self.exclude = Some(default_exclude(metrics_path));
        }
    }
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_dashboard() -> String {
    "/".to_string()
}

fn default_public_routes() -> Vec<String> {
    ["/login", "/api/auth/login", "/api/auth/refresh"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_auth_only_routes() -> Vec<String> {
    ["/profile", "/unauthorized", "/api/auth/me", "/api/auth/logout"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_permissions() -> Vec<PermissionRule> {
    vec![
        PermissionRule::new("/admin", &["read:all_users"]),
        PermissionRule::new("/doctors/scan", &["scan:worker_qr"]),
        PermissionRule::new("/doctors", &["read:patient_profiles"]),
        PermissionRule::new("/workers/dashboard", &["read:own_profile"]),
        PermissionRule::new("/workers", &["read:own_profile", "read:patient_profiles"]),
    ]
}

fn default_dashboards() -> BTreeMap<String, String> {
    [
        ("worker", "/workers/dashboard"),
        ("doctor", "/doctors"),
        ("admin", "/admin"),
    ]
    .into_iter()
    .map(|(role, path)| (role.to_string(), path.to_string()))
    .collect()
}

fn default_markers() -> Vec<String> {
    vec!["/_next/".to_string()]
}

fn default_extensions() -> Vec<String> {
    [
        ".js", ".css", ".map", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp", ".woff",
        ".woff2",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_include() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_exclude(metrics_path: &str) -> Vec<String> {
    vec!["/health*".to_string(), metrics_path.to_string()]
}
