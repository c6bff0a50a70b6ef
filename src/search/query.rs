//! Stage 4: query building. One LLM call producing `{query, recency}`,
//! validated against the user message/entity/a stopword allowlist, with a
//! deterministic template-based fallback when validation fails.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::entity::{EntityType, ResolvedEntity};
use super::mode::SearchMode;
use crate::llm::LlmClient;
use crate::model::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recency {
    Day,
    Week,
    Month,
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltQuery {
    pub query: String,
    pub recency: Recency,
}

const STOPWORD_ALLOWLIST: &[&str] = &[
    "the", "a", "an", "on", "about", "in", "of", "to", "for", "and", "news", "latest", "today", "this", "week", "month",
];

#[derive(Deserialize)]
struct RawQuery {
    #[serde(default)]
    query: String,
    #[serde(default)]
    recency: String,
}

fn parse_recency(raw: &str) -> Recency {
    match raw {
        "day" => Recency::Day,
        "week" => Recency::Week,
        "month" => Recency::Month,
        _ => Recency::Any,
    }
}

/// Every token of `query` must appear in `message`, `entity_name`, or the
/// stopword allowlist.
fn is_valid_query(query: &str, message: &str, entity_name: &str) -> bool {
    if query.trim().is_empty() {
        return false;
    }
    let message_lower = message.to_ascii_lowercase();
    let entity_lower = entity_name.to_ascii_lowercase();
    query.split_whitespace().all(|token| {
        let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_ascii_lowercase();
        if token.is_empty() {
            return true;
        }
        message_lower.contains(&token) || entity_lower.contains(&token) || STOPWORD_ALLOWLIST.contains(&token.as_str())
    })
}

/// Detects a recency keyword in the message; defaults to `Any`.
pub fn detect_recency_keyword(message: &str) -> Recency {
    let lower = message.to_ascii_lowercase();
    if lower.contains("today") || lower.contains("this morning") {
        Recency::Day
    } else if lower.contains("this week") || lower.contains("last week") {
        Recency::Week
    } else if lower.contains("past month") {
        Recency::Month
    } else {
        Recency::Any
    }
}

fn fallback_query(message: &str, mode: SearchMode, entity: &ResolvedEntity) -> BuiltQuery {
    let recency = detect_recency_keyword(message);
    let query = match (mode, entity.entity_type) {
        (SearchMode::NewsAggregate, EntityType::None) => format!("{} news", message.trim()),
        (SearchMode::NewsAggregate, _) => format!("{} news", entity.name),
        (_, EntityType::None) => message.trim().to_string(),
        (_, _) => format!("{} {}", entity.name, entity.hint).trim().to_string(),
    };
    BuiltQuery { query, recency }
}

pub async fn build_query(llm: &dyn LlmClient, message: &str, mode: SearchMode, entity: &ResolvedEntity) -> BuiltQuery {
    let prompt = format!(
        "Build a concise web search query for this message. Reply with only JSON: \
         {{\"query\": string, \"recency\": \"day\"|\"week\"|\"month\"|\"any\"}}.\n\nMessage: {message}"
    );
    let messages = vec![ChatMessage::system("You build precise web search queries."), ChatMessage::user(prompt)];
    let cancel = Arc::new(AtomicBool::new(false));

    let Ok(response) = llm.chat(&messages, None, Some(60), cancel).await else {
        return fallback_query(message, mode, entity);
    };
    let Some(content) = response.content else {
        return fallback_query(message, mode, entity);
    };
    let Ok(raw) = serde_json::from_str::<RawQuery>(content.trim()) else {
        return fallback_query(message, mode, entity);
    };
    if !is_valid_query(&raw.query, message, &entity.name) {
        return fallback_query(message, mode, entity);
    }
    BuiltQuery { query: raw.query, recency: parse_recency(&raw.recency) }
}
