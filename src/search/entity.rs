//! Stage 3: entity resolution. One LLM call producing a small structured
//! `{name, type, hint}` triple; unknown entities resolve to `EntityType::None`.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::LlmClient;
use crate::model::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Person,
    Org,
    Topic,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub hint: String,
}

impl ResolvedEntity {
    fn none() -> Self {
        Self { name: String::new(), entity_type: EntityType::None, hint: String::new() }
    }
}

/// A strict subset of `ResolvedEntity` used only to parse the model's raw
/// JSON reply, so a malformed `type` value doesn't panic the caller.
#[derive(Deserialize)]
struct RawEntity {
    #[serde(default)]
    name: String,
    #[serde(default)]
    r#type: String,
    #[serde(default)]
    hint: String,
}

pub async fn resolve_entity(llm: &dyn LlmClient, message: &str) -> ResolvedEntity {
    let prompt = format!(
        "Identify the primary named entity in this message, if any. Reply with only JSON: \
         {{\"name\": string, \"type\": \"person\"|\"org\"|\"topic\"|\"none\", \"hint\": string}}.\n\nMessage: {message}"
    );
    let messages = vec![ChatMessage::system("You extract entities as strict JSON."), ChatMessage::user(prompt)];
    let cancel = Arc::new(AtomicBool::new(false));
    let Ok(response) = llm.chat(&messages, None, Some(80), cancel).await else {
        return ResolvedEntity::none();
    };
    let Some(content) = response.content else {
        return ResolvedEntity::none();
    };
    let Ok(raw) = serde_json::from_str::<RawEntity>(content.trim()) else {
        return ResolvedEntity::none();
    };
    let entity_type = match raw.r#type.as_str() {
        "person" => EntityType::Person,
        "org" => EntityType::Org,
        "topic" => EntityType::Topic,
        _ => EntityType::None,
    };
    if matches!(entity_type, EntityType::None) {
        return ResolvedEntity::none();
    }
    ResolvedEntity { name: raw.name, entity_type, hint: raw.hint }
}
