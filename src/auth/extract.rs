use std::collections::HashMap;

use http::{HeaderMap, header::AUTHORIZATION};

const BEARER_PREFIX: &str = "Bearer ";

/// One place a credential may be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// `Authorization: Bearer <credential>`
    Bearer,
    /// A cookie holding the raw credential.
    Cookie(String),
}

impl CredentialSource {
    fn extract<'a>(
        &self,
        headers: &'a HeaderMap,
        cookies: &'a HashMap<String, String>,
    ) -> Option<&'a str> {
        let credential = match self {
            CredentialSource::Bearer => headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix(BEARER_PREFIX)),
            CredentialSource::Cookie(name) => cookies.get(name).map(String::as_str),
        };
        credential.filter(|c| !c.is_empty())
    }
}

/// Ordered list of credential sources; the first hit wins.
#[derive(Debug, Clone)]
pub struct CredentialExtractor {
    sources: Vec<CredentialSource>,
}

impl CredentialExtractor {
    pub fn new(sources: Vec<CredentialSource>) -> Self {
        Self { sources }
    }

    /// Bearer header first, then the named cookie.
    pub fn bearer_then_cookie(cookie_name: &str) -> Self {
        Self::new(vec![
            CredentialSource::Bearer,
            CredentialSource::Cookie(cookie_name.to_string()),
        ])
    }

    pub fn extract<'a>(
        &self,
        headers: &'a HeaderMap,
        cookies: &'a HashMap<String, String>,
    ) -> Option<&'a str> {
        self.sources
            .iter()
            .find_map(|source| source.extract(headers, cookies))
    }
}
