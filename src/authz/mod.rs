//! Authorization tables and the policy that bundles them.
//!
//! Everything here is built once from configuration and never mutated, so an
//! [`AccessPolicy`] can be shared across any number of concurrent requests.

mod classify;
mod resolver;

use std::{collections::BTreeMap, fmt};

pub use classify::{ExemptReason, Exemption, RouteClass, RouteTable, StaticPathClassifier};
pub use resolver::{PermissionResolver, Resolution, ResolvedBy};
use serde::Serialize;

use crate::{
    auth::{CredentialExtractor, Role},
    config::{AccessConfig, AuthConfig},
};

/// Match a pattern against a value.
///
/// Supports three matching modes:
/// - `*` matches any value
/// - `/foo*` matches any value starting with `/foo`
/// - `/foo` matches only `/foo`
pub(crate) fn pattern_matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        true
    } else if let Some(prefix) = pattern.strip_suffix('*') {
        value.starts_with(prefix)
    } else {
        pattern == value
    }
}

/// Process-wide, read-only access policy.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    classifier: StaticPathClassifier,
    resolver: PermissionResolver,
    extractor: CredentialExtractor,
    api_prefix: String,
    login_path: String,
    dashboards: BTreeMap<String, String>,
    default_dashboard: String,
}

impl AccessPolicy {
    pub fn from_config(access: &AccessConfig, auth: &AuthConfig) -> Self {
        Self {
            classifier: StaticPathClassifier::from_config(access),
            resolver: PermissionResolver::from_config(access),
            extractor: CredentialExtractor::bearer_then_cookie(&auth.cookie_name),
            api_prefix: access.api_prefix.clone(),
            login_path: access.login_path.clone(),
            dashboards: access.dashboards.clone(),
            default_dashboard: access.default_dashboard.clone(),
        }
    }

    pub fn classifier(&self) -> &StaticPathClassifier {
        &self.classifier
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn extractor(&self) -> &CredentialExtractor {
        &self.extractor
    }

    /// API paths get JSON errors; everything else gets redirects.
    pub fn is_api_path(&self, path: &str) -> bool {
        path.starts_with(self.api_prefix.as_str())
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Landing path for a role, falling back to the default dashboard.
    pub fn dashboard_for(&self, role: &Role) -> &str {
        self.dashboards
            .get(role.as_str())
            .unwrap_or(&self.default_dashboard)
    }

    /// Describe how a path is handled without evaluating any credential.
    pub fn explain<'a>(&'a self, path: &'a str) -> PathReport<'a> {
        let exempt = match self.classifier.classify(path) {
            Exemption::Exempt(reason) => Some(reason),
            Exemption::NotExempt => None,
        };
        let resolution = self.resolver.resolve(path);
        PathReport {
            path,
            exempt,
            route_class: self.classifier.routes().classify(path),
            api: self.is_api_path(path),
            required_any_of: resolution.required,
            resolved_by: resolution.resolved_by,
        }
    }
}

/// Static view of how the policy treats one path.
#[derive(Debug, Serialize)]
pub struct PathReport<'a> {
    pub path: &'a str,
    pub exempt: Option<ExemptReason>,
    pub route_class: RouteClass,
    pub api: bool,
    pub required_any_of: &'a [String],
    pub resolved_by: ResolvedBy<'a>,
}

impl fmt::Display for PathReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "path:        {}", self.path)?;
        match self.exempt {
            Some(reason) => writeln!(f, "exempt:      yes ({reason:?})")?,
            None => writeln!(f, "exempt:      no")?,
        }
        writeln!(f, "route class: {:?}", self.route_class)?;
        writeln!(f, "api path:    {}", self.api)?;
        if self.required_any_of.is_empty() {
            writeln!(f, "requires:    authentication only")?;
        } else {
            writeln!(f, "requires:    any of {}", self.required_any_of.join(", "))?;
        }
        match self.resolved_by {
            ResolvedBy::Exact(entry) => write!(f, "resolved by: exact entry '{entry}'"),
            ResolvedBy::Prefix(entry) => write!(f, "resolved by: prefix entry '{entry}'"),
            ResolvedBy::Structural(rule) => write!(f, "resolved by: built-in rule '{rule}'"),
            ResolvedBy::Default => write!(f, "resolved by: default"),
        }
    }
}
