//! URL canonicalization and content hashing used as Job identity keys.

use sha2::{Digest, Sha256};
use url::{form_urlencoded, Url};

/// Query parameters that never contribute to a posting's identity.
pub const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gh_src",
    "lever-source",
    "lever-origin",
    "fbclid",
    "gclid",
];

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

fn strip_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Sorted query without blank values or tracking keys; `None` when nothing is left.
fn canonical_query(query: &str) -> Option<String> {
    let mut params = form_urlencoded::parse(query.as_bytes())
        .filter(|(k, v)| !v.is_empty() && !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect::<Vec<_>>();
    if params.is_empty() {
        return None;
    }
    params.sort();
    Some(
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&params)
            .finish(),
    )
}

/// Deterministic identity form of a URL. Empty input means "no URL identity".
///
/// Strings that do not parse as absolute URLs get the same fragment, query and
/// trailing-slash treatment; only scheme/host lowercasing needs a parsed URL.
pub fn canonicalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let Ok(mut url) = Url::parse(trimmed) else {
        let without_fragment = trimmed.split('#').next().unwrap_or_default();
        let (path, query) = without_fragment
            .split_once('?')
            .unwrap_or((without_fragment, ""));
        let path = strip_trailing_slash(path);
        return match canonical_query(query) {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };
    };

    url.set_fragment(None);
    let query = url.query().and_then(canonical_query);
    url.set_query(query.as_deref());

    let path = url.path().to_string();
    let stripped = strip_trailing_slash(&path);
    if stripped.len() != path.len() {
        url.set_path(stripped);
    }
    url.to_string()
}

/// Lowercase, collapse whitespace runs to one space, trim.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn sha256(bytes: &[u8]) -> Vec<u8> {
    Sha256::digest(bytes).to_vec()
}

pub fn desc_hash(description: &str) -> Vec<u8> {
    sha256(normalize_text(description).as_bytes())
}

/// Digest of an already-canonical URL; `None` when there is no URL identity.
pub fn url_hash(canonical_url: &str) -> Option<Vec<u8>> {
    (!canonical_url.is_empty()).then(|| sha256(canonical_url.as_bytes()))
}

/// Identity keys computed once per inbound item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityKeys {
    pub canonical_url: String,
    pub url_hash: Option<Vec<u8>>,
    pub desc_hash: Vec<u8>,
}

impl IdentityKeys {
    pub fn compute(url: Option<&str>, description: &str) -> Self {
        let canonical_url = canonicalize_url(url.unwrap_or_default());
        Self {
            url_hash: url_hash(&canonical_url),
            desc_hash: desc_hash(description),
            canonical_url,
        }
    }
}
