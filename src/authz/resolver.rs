//! Path → required permission resolution.
//!
//! Resolution order, first hit wins:
//! 1. exact match against the permission table,
//! 2. prefix match in declaration order (not longest prefix),
//! 3. built-in rules for the per-role API subtrees,
//! 4. nothing required.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::{AccessConfig, PermissionRule};

/// Where a resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", content = "entry", rename_all = "snake_case")]
pub enum ResolvedBy<'a> {
    Exact(&'a str),
    Prefix(&'a str),
    Structural(&'static str),
    Default,
}

/// Permissions required for a path (any-of) and the tier that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub required: &'a [String],
    pub resolved_by: ResolvedBy<'a>,
}

impl Resolution<'_> {
    /// No specific permission needed; a valid identity suffices.
    pub fn is_open(&self) -> bool {
        self.required.is_empty()
    }
}

/// Built-in rule for an API subtree: `<api_prefix><subtree>...`, optionally
/// narrowed to paths containing `segment`.
#[derive(Debug, Clone)]
struct StructuralRule {
    name: &'static str,
    prefix: String,
    segment: Option<&'static str>,
    any_of: Vec<String>,
}

impl StructuralRule {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(self.prefix.as_str())
            && self.segment.is_none_or(|segment| path.contains(segment))
    }
}

/// (name, subtree, required segment, permissions). Order matters: the
/// documents rule must precede the generic workers rule.
const STRUCTURAL_RULES: &[(&str, &str, Option<&str>, &[&str])] = &[
    (
        "worker_documents",
        "/workers",
        Some("/documents"),
        &["read:own_documents", "read:patient_documents"],
    ),
    (
        "worker_profile",
        "/workers",
        None,
        &["read:own_profile", "read:patient_profiles"],
    ),
    ("doctor", "/doctors", None, &["read:patient_profiles"]),
    ("admin", "/admin", None, &["read:all_users"]),
];

#[derive(Debug, Clone)]
pub struct PermissionResolver {
    rules: Vec<PermissionRule>,
    exact: HashMap<String, usize>,
    structural: Vec<StructuralRule>,
}

impl PermissionResolver {
    /// Build from an ordered permission table. Structural rules are rooted at `api_prefix`.
    pub fn new(rules: Vec<PermissionRule>, api_prefix: &str) -> Self {
        let mut exact = HashMap::with_capacity(rules.len());
        for (idx, rule) in rules.iter().enumerate() {
            exact.entry(rule.path.clone()).or_insert(idx);
        }

        let structural = STRUCTURAL_RULES
            .iter()
            .map(|&(name, subtree, segment, any_of)| StructuralRule {
                name,
                prefix: format!("{}{subtree}", api_prefix.trim_end_matches('/')),
                segment,
                any_of: any_of.iter().map(|p| p.to_string()).collect(),
            })
            .collect();

        Self {
            rules,
            exact,
            structural,
        }
    }

    pub fn from_config(config: &AccessConfig) -> Self {
        Self::new(config.permissions.clone(), &config.api_prefix)
    }

    pub fn resolve(&self, path: &str) -> Resolution<'_> {
        if let Some(rule) = self.exact.get(path).map(|&idx| &self.rules[idx]) {
            return Resolution {
                required: &rule.any_of,
                resolved_by: ResolvedBy::Exact(&rule.path),
            };
        }

        if let Some(rule) = self
            .rules
            .iter()
            .find(|rule| path.starts_with(rule.path.as_str()))
        {
            return Resolution {
                required: &rule.any_of,
                resolved_by: ResolvedBy::Prefix(&rule.path),
            };
        }

        if let Some(rule) = self.structural.iter().find(|rule| rule.matches(path)) {
            return Resolution {
                required: &rule.any_of,
                resolved_by: ResolvedBy::Structural(rule.name),
            };
        }

        Resolution {
            required: &[],
            resolved_by: ResolvedBy::Default,
        }
    }
}
