//! Static path classification and the route classification table.

use serde::Serialize;

use crate::config::AccessConfig;

/// Why a path bypasses the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptReason {
    /// Path contains a framework-internal marker such as `/_next/`.
    FrameworkAsset,
    /// Path ends in a static asset extension.
    StaticAsset,
    /// Path equals or is prefixed by a public route.
    PublicRoute,
}

/// Result of static classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exemption {
    Exempt(ExemptReason),
    NotExempt,
}

impl Exemption {
    pub fn is_exempt(self) -> bool {
        matches!(self, Exemption::Exempt(_))
    }
}

/// Classification tag carried by the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    Public,
    AuthOnly,
    PermissionGated,
}

/// Ordered route classification table.
///
/// Entries match when the path equals the entry or starts with it (raw string
/// prefix). The first matching entry wins; unmatched paths are permission gated.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<(String, RouteClass)>,
}

impl RouteTable {
    pub fn new(entries: Vec<(String, RouteClass)>) -> Self {
        Self { entries }
    }

    /// Public routes first, then auth-only routes, each in declaration order.
    pub fn from_config(config: &AccessConfig) -> Self {
        let public = config
            .public_routes
            .iter()
            .map(|p| (p.clone(), RouteClass::Public));
        let auth_only = config
            .auth_only_routes
            .iter()
            .map(|p| (p.clone(), RouteClass::AuthOnly));
        Self::new(public.chain(auth_only).collect())
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        self.entries
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, class)| *class)
            .unwrap_or(RouteClass::PermissionGated)
    }
}

/// Decides whether a path is exempt from every check.
#[derive(Debug, Clone)]
pub struct StaticPathClassifier {
    markers: Vec<String>,
    extensions: Vec<String>,
    routes: RouteTable,
}

impl StaticPathClassifier {
    pub fn new(markers: Vec<String>, extensions: Vec<String>, routes: RouteTable) -> Self {
        Self {
            markers,
            extensions,
            routes,
        }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(
            config.static_assets.markers.clone(),
            config.static_assets.extensions.clone(),
            RouteTable::from_config(config),
        )
    }

    pub fn classify(&self, path: &str) -> Exemption {
        if self.markers.iter().any(|m| path.contains(m.as_str())) {
            return Exemption::Exempt(ExemptReason::FrameworkAsset);
        }
        if self.extensions.iter().any(|ext| path.ends_with(ext.as_str())) {
            return Exemption::Exempt(ExemptReason::StaticAsset);
        }
        if self.routes.classify(path) == RouteClass::Public {
            return Exemption::Exempt(ExemptReason::PublicRoute);
        }
        Exemption::NotExempt
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}
