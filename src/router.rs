//! The Router: four deterministic-first layers that turn a user message
//! into a `RouterOutput`, falling back to one LLM classification call only
//! when the first three all miss.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::capability::{Intent, RouterLayer, RouterOutput};
use crate::llm::LlmClient;
use crate::model::ChatMessage;
use crate::utility;

const TEMPORAL_MARKERS: &[&str] = &["today", "this week", "latest", "breaking"];

fn has_temporal_marker(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    TEMPORAL_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Layer 1: a handful of explicit override prefixes that fix the intent
/// outright, bypassing every other layer.
fn match_explicit_override(message: &str) -> Option<Intent> {
    let trimmed = message.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("/search") || lower.starts_with("search:") {
        return Some(Intent::LookupSearch);
    }
    if lower.starts_with("/chat") {
        return Some(Intent::ChatOnly);
    }
    if lower.starts_with("/file") {
        return Some(Intent::FileTask);
    }
    if lower.starts_with("/system") {
        return Some(Intent::SystemTask);
    }
    None
}

/// Layer 3: compact keyword tables per intent. First table whose keyword
/// appears in the message wins; table order below is the tie-break order.
fn match_heuristic(message: &str, has_recent_search_session: bool) -> Option<Intent> {
    let lower = message.to_ascii_lowercase();

    const FOLLOW_UP: &[&str] = &["tell me more", "what about", "more on that", "keep going"];
    if has_recent_search_session && FOLLOW_UP.iter().any(|k| lower.contains(k)) {
        return Some(Intent::LookupSearch);
    }

    const MEMORY_WRITE: &[&str] = &["remember that", "remember i", "don't forget that", "note that i"];
    if MEMORY_WRITE.iter().any(|k| lower.contains(k)) {
        return Some(Intent::MemoryWrite);
    }

    const MEMORY_READ: &[&str] = &["what do you know about me", "what do you remember about me"];
    if MEMORY_READ.iter().any(|k| lower.contains(k)) {
        return Some(Intent::MemoryRead);
    }

    const NEWS: &[&str] = &["news", "headlines", "what's happening"];
    if NEWS.iter().any(|k| lower.contains(k)) {
        return Some(Intent::LookupNews);
    }

    const SCREEN: &[&str] = &["what's on my screen", "screenshot", "what am i looking at"];
    if SCREEN.iter().any(|k| lower.contains(k)) {
        return Some(Intent::ScreenObserve);
    }

    const FILE: &[&str] = &["open the file", "read the file", "in my documents", "write a file"];
    if FILE.iter().any(|k| lower.contains(k)) {
        return Some(Intent::FileTask);
    }

    const SYSTEM: &[&str] = &["run the command", "execute", "open the application", "launch "];
    if SYSTEM.iter().any(|k| lower.contains(k)) {
        return Some(Intent::SystemTask);
    }

    const BROWSE: &[&str] = &["go to this website", "open this link", "navigate to"];
    if BROWSE.iter().any(|k| lower.contains(k)) {
        return Some(Intent::BrowseOnce);
    }

    const FACT: &[&str] = &["who is", "who was", "what is the capital", "when did", "how old is"];
    if FACT.iter().any(|k| lower.contains(k)) {
        return Some(Intent::LookupFact);
    }

    const SEARCH: &[&str] = &["search for", "look up", "find out"];
    if SEARCH.iter().any(|k| lower.contains(k)) {
        return Some(Intent::LookupSearch);
    }

    None
}

const LLM_LABELS: &[(&str, Intent)] = &[
    ("chat_only", Intent::ChatOnly),
    ("lookup_fact", Intent::LookupFact),
    ("lookup_news", Intent::LookupNews),
    ("lookup_search", Intent::LookupSearch),
    ("browse_once", Intent::BrowseOnce),
    ("one_shot_discovery", Intent::OneShotDiscovery),
    ("screen_observe", Intent::ScreenObserve),
    ("file_task", Intent::FileTask),
    ("system_task", Intent::SystemTask),
    ("memory_read", Intent::MemoryRead),
    ("memory_write", Intent::MemoryWrite),
    ("general_tool", Intent::GeneralTool),
];

/// Layer 4: a single short LLM call asking for one label from a fixed
/// vocabulary. Any failure, or a label outside the vocabulary, falls back
/// to `chat_only`.
async fn classify_with_llm(client: &dyn LlmClient, message: &str) -> (Intent, f32) {
    let labels = LLM_LABELS.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(", ");
    let prompt = format!(
        "Classify the user message into exactly one label from [{labels}]. Reply with only the label.\n\nMessage: {message}"
    );
    let messages = vec![ChatMessage::system("You are an intent classifier."), ChatMessage::user(prompt)];
    let cancel = Arc::new(AtomicBool::new(false));
    match client.chat(&messages, None, Some(16), cancel).await {
        Ok(response) => {
            let label = response.content.unwrap_or_default().trim().to_ascii_lowercase();
            match LLM_LABELS.iter().find(|(name, _)| *name == label) {
                Some((_, intent)) => (*intent, 0.6),
                None => (Intent::ChatOnly, 0.0),
            }
        }
        Err(_) => (Intent::ChatOnly, 0.0),
    }
}

/// Session-derived flags the Router needs but does not own.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionFlags {
    pub has_recent_search_session: bool,
}

/// Runs all four layers in order and produces a `RouterOutput`. `llm` is
/// only invoked when layers 1-3 all miss.
#[tracing::instrument(skip(message, llm), fields(has_recent_search_session = flags.has_recent_search_session))]
pub async fn route(message: &str, flags: SessionFlags, llm: &dyn LlmClient) -> RouterOutput {
    tracing::debug!(message, "routing turn");
    let needs_web_from_temporal = has_temporal_marker(message);

    if let Some(intent) = match_explicit_override(message) {
        return finish(intent, RouterLayer::ExplicitOverride, None, needs_web_from_temporal);
    }

    if utility::match_message(message, None).is_some() {
        return finish(Intent::UtilityDeterministic, RouterLayer::DeterministicUtility, None, false);
    }

    if let Some(intent) = match_heuristic(message, flags.has_recent_search_session) {
        return finish(intent, RouterLayer::Heuristic, None, needs_web_from_temporal);
    }

    let (intent, confidence) = classify_with_llm(llm, message).await;
    finish(intent, RouterLayer::LlmClassification, Some(confidence), needs_web_from_temporal)
}

fn finish(intent: Intent, layer: RouterLayer, llm_confidence: Option<f32>, needs_web_from_temporal: bool) -> RouterOutput {
    let needs_search = intent.is_search();
    let needs_web = needs_search || needs_web_from_temporal;
    let mut out = RouterOutput::new(intent, layer, needs_web, needs_search);
    if let Some(confidence) = llm_confidence {
        out = out.with_confidence(confidence);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmResponse;
    use async_trait::async_trait;

    struct UnreachableLlm;

    #[async_trait]
    impl LlmClient for UnreachableLlm {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: Option<&[crate::model::ToolDefinition]>,
            _max_tokens_override: Option<u32>,
            _cancel: Arc<AtomicBool>,
        ) -> crate::llm::LlmResult<LlmResponse> {
            Err("unreachable".to_string())
        }
    }

    #[tokio::test]
    async fn explicit_override_bypasses_every_other_layer() {
        let out = route("/search latest rust release", SessionFlags::default(), &UnreachableLlm).await;
        assert_eq!(out.intent, Intent::LookupSearch);
        assert_eq!(out.confidence, 1.0);
    }

    #[tokio::test]
    async fn deterministic_utility_hit_short_circuits_heuristics() {
        let out = route("350F in C", SessionFlags::default(), &UnreachableLlm).await;
        assert_eq!(out.intent, Intent::UtilityDeterministic);
        assert!(!out.needs_web);
    }

    #[tokio::test]
    async fn heuristic_layer_matches_news_keyword() {
        let out = route("what's the news today", SessionFlags::default(), &UnreachableLlm).await;
        assert_eq!(out.intent, Intent::LookupNews);
        assert_eq!(out.confidence, 0.8);
        assert!(out.needs_web);
    }

    #[tokio::test]
    async fn llm_layer_falls_back_to_chat_only_on_failure() {
        let out = route("ramblings with no keyword match at all", SessionFlags::default(), &UnreachableLlm).await;
        assert_eq!(out.intent, Intent::ChatOnly);
        assert_eq!(out.confidence, 0.0);
    }

    #[tokio::test]
    async fn follow_up_keyword_only_matches_with_a_recent_search_session() {
        let flags = SessionFlags { has_recent_search_session: true };
        let out = route("tell me more about that", flags, &UnreachableLlm).await;
        assert_eq!(out.intent, Intent::LookupSearch);
    }
}
