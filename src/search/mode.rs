//! Stage 1 (mode classifier) and stage 2 (follow-up branch) of the Search
//! Orchestrator. Both are pure functions of the message and a session
//! snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::SearchSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    NewsAggregate,
    WebFactFind,
    FollowUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpKind {
    MoreSources,
    DeepDive,
}

const FOLLOW_UP_MARKERS: &[&str] = &["tell me more", "more on that", "what about", "keep going", "dig deeper"];
const NEWS_MARKERS: &[&str] = &["news", "headlines", "what's happening", "latest on"];

/// Classifies the turn's search mode. Follow-up requires a session with
/// unexpired recent results; absent that, falls back to fact-find.
pub fn classify_mode(message: &str, session: Option<&SearchSession>, now: DateTime<Utc>) -> SearchMode {
    let lower = message.to_ascii_lowercase();
    let looks_like_follow_up = FOLLOW_UP_MARKERS.iter().any(|m| lower.contains(m));

    if looks_like_follow_up {
        if let Some(session) = session {
            if session.has_recent_results(now) {
                return SearchMode::FollowUp;
            }
        }
        return SearchMode::WebFactFind;
    }

    if NEWS_MARKERS.iter().any(|m| lower.contains(m)) {
        return SearchMode::NewsAggregate;
    }

    SearchMode::WebFactFind
}

const MORE_SOURCES_MARKERS: &[&str] = &["more sources", "other sources", "anything else", "what else", "other articles"];

/// Within a `FollowUp`, decides whether to navigate into the primary source
/// for a deep dive (default) or fetch more sources on the same topic.
pub fn classify_follow_up(message: &str) -> FollowUpKind {
    let lower = message.to_ascii_lowercase();
    if MORE_SOURCES_MARKERS.iter().any(|m| lower.contains(m)) {
        FollowUpKind::MoreSources
    } else {
        FollowUpKind::DeepDive
    }
}
