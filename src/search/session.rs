//! `SearchSession`: per-conversation search state, and the `SourceItem`
//! stable-id scheme it's built from.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::mode::SearchMode;
use super::query::Recency;

/// Results are considered "recent" (eligible for a follow-up branch) for
/// this long after the search that produced them.
pub const SESSION_TTL_MINUTES: i64 = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceItem {
    pub url: String,
    pub title: String,
    pub domain: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_id: String,
}

impl SourceItem {
    pub fn new(url: impl Into<String>, title: impl Into<String>, domain: Option<String>, published_at: Option<DateTime<Utc>>) -> Self {
        let url = url.into();
        let source_id = source_id(&url);
        Self { url, title: title.into(), domain, published_at, source_id }
    }
}

/// Lowercases scheme and host, strips a single trailing slash, and leaves
/// path/query untouched — then SHA-256's the result, hex-encoded. Stable
/// across case/slash/scheme-casing differences in the same URL.
pub fn source_id(url: &str) -> String {
    let normalized = normalize_url(url);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.trim_end_matches('/').to_string();
    };
    let scheme = scheme.to_ascii_lowercase();
    let (host, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    let host = host.to_ascii_lowercase();
    let mut normalized = format!("{scheme}://{host}{path}");
    if normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSession {
    pub last_mode: Option<SearchMode>,
    pub last_query: Option<String>,
    pub last_recency: Option<Recency>,
    pub last_results: Vec<SourceItem>,
    pub primary_source_id: Option<String>,
    pub last_entity_canonical: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SearchSession {
    /// True when the session has results that haven't aged past the TTL.
    pub fn has_recent_results(&self, now: DateTime<Utc>) -> bool {
        match self.updated_at {
            Some(updated_at) => !self.last_results.is_empty() && now - updated_at < Duration::minutes(SESSION_TTL_MINUTES),
            None => false,
        }
    }

    pub fn record(
        &mut self,
        mode: SearchMode,
        query: String,
        recency: Recency,
        results: Vec<SourceItem>,
        entity_canonical: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.primary_source_id = results.first().map(|s| s.source_id.clone());
        self.last_mode = Some(mode);
        self.last_query = Some(query);
        self.last_recency = Some(recency);
        self.last_results = results;
        self.last_entity_canonical = entity_canonical;
        self.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_id_is_stable_across_case_and_trailing_slash() {
        let a = source_id("HTTPS://Example.com/Article/");
        let b = source_id("https://example.com/Article");
        assert_eq!(a, b);
    }

    #[test]
    fn source_id_differs_for_different_paths() {
        assert_ne!(source_id("https://example.com/a"), source_id("https://example.com/b"));
    }

    #[test]
    fn source_id_is_stable_for_root_path_with_and_without_trailing_slash() {
        let a = source_id("https://example.com/");
        let b = source_id("https://example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn session_without_updated_at_has_no_recent_results() {
        let session = SearchSession::default();
        assert!(!session.has_recent_results(Utc::now()));
    }

    #[test]
    fn session_results_expire_after_ttl() {
        let mut session = SearchSession::default();
        session.record(SearchMode::WebFactFind, "q".into(), Recency::Day, vec![], None, Utc::now() - Duration::minutes(20));
        assert!(!session.has_recent_results(Utc::now()));
    }

    #[test]
    fn session_results_are_recent_within_ttl() {
        let mut session = SearchSession::default();
        session.record(SearchMode::WebFactFind, "q".into(), Recency::Day, vec![], None, Utc::now());
        assert!(session.has_recent_results(Utc::now()));
    }
}
