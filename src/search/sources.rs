//! Stage 6: parses the `web_search` tool's text-plus-JSON-footer result
//! format into a text body and a list of `SourceItem`s. Absence or
//! malformation of the footer yields an empty source list, never an error.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::session::SourceItem;

const DELIMITER: &str = "<!-- SOURCES_JSON -->";

#[derive(Deserialize)]
struct RawSource {
    url: String,
    title: String,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
}

pub fn parse_sources(raw: &str) -> (String, Vec<SourceItem>) {
    let Some((body, json_part)) = raw.split_once(DELIMITER) else {
        return (raw.trim().to_string(), Vec::new());
    };
    let body = body.trim().to_string();
    let Ok(raw_sources) = serde_json::from_str::<Vec<RawSource>>(json_part.trim()) else {
        return (body, Vec::new());
    };
    let sources = raw_sources
        .into_iter()
        .map(|s| SourceItem::new(s.url, s.title, s.domain, s.published_at))
        .collect();
    (body, sources)
}
