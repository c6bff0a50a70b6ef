//! The Search Orchestrator: the sub-pipeline for `lookup_*` intents. Each
//! stage below is grounded on its own module; this file sequences them and
//! owns the output-contract flags and session update.

pub mod clustering;
pub mod entity;
pub mod mode;
pub mod query;
pub mod session;
pub mod sources;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::capability::Capability;
use crate::llm::LlmClient;
use crate::model::ChatMessage;
use crate::tool_client::{AuditedToolClient, CallContext};

use entity::{resolve_entity, EntityType, ResolvedEntity};
use mode::{classify_follow_up, classify_mode, FollowUpKind, SearchMode};
use query::{build_query, BuiltQuery, Recency};
use session::{SearchSession, SourceItem};
use sources::parse_sources;

/// Named messages that short-circuit the whole pipeline with a canned,
/// deterministic answer and no search call at all.
const NAMED_SHORT_CIRCUITS: &[(&str, &str)] =
    &[("airspeed velocity of an unladen swallow", "An unladen European swallow flies at roughly 11 meters per second (24 mph).")];

/// Market-quote queries older than this are refused rather than presented
/// as current.
const FRESHNESS_WINDOW_HOURS: i64 = 12;

const MARKET_QUOTE_MARKERS: &[&str] = &["dow jones", "nasdaq", "s&p", "stock price", "market quote", "share price"];

pub struct SearchOutcome {
    pub text: String,
    pub suppress_source_cards_ui: bool,
    pub suppress_tool_activity_ui: bool,
    pub session: SearchSession,
    pub tool_calls_made: u32,
    pub llm_round_trips: u32,
}

fn named_short_circuit(message: &str) -> Option<&'static str> {
    let lower = message.to_ascii_lowercase();
    NAMED_SHORT_CIRCUITS.iter().find(|(phrase, _)| lower.contains(phrase)).map(|(_, answer)| *answer)
}

fn is_market_quote_query(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    MARKET_QUOTE_MARKERS.iter().any(|m| lower.contains(m))
}

async fn call_web_search(
    client: &AuditedToolClient,
    session_id: &str,
    query: &str,
    recency: Recency,
) -> String {
    let args = serde_json::json!({ "query": query, "recency": recency, "max_results": 8 }).to_string();
    let ctx = CallContext { session_id: session_id.to_string(), capability: Some(Capability::WebSearch), cancel: Arc::new(AtomicBool::new(false)) };
    client.call("web_search", &args, ctx).await
}

async fn summarize(llm: &dyn LlmClient, message: &str, body: &str, sources: &[SourceItem]) -> String {
    let titles = sources.iter().map(|s| s.title.as_str()).collect::<Vec<_>>().join("; ");
    let prompt = format!(
        "The user asked: \"{message}\". Web search returned:\n{body}\n\nSource titles: {titles}\n\nWrite a concise answer grounded only in this material."
    );
    let messages = vec![ChatMessage::system("You summarize search results for the user."), ChatMessage::user(prompt)];
    let cancel = Arc::new(AtomicBool::new(false));
    match llm.chat(&messages, None, None, cancel).await {
        Ok(response) => response.content.unwrap_or_default(),
        Err(_) => "I couldn't put together a summary of what I found. Please try again.".to_string(),
    }
}

fn output_flags(mode: SearchMode) -> (bool, bool) {
    match mode {
        SearchMode::WebFactFind => (true, true),
        SearchMode::NewsAggregate | SearchMode::FollowUp => (false, false),
    }
}

#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip(llm, client, message, session), fields(session_id))]
pub async fn run(
    llm: &dyn LlmClient,
    client: &AuditedToolClient,
    session_id: &str,
    message: &str,
    mut session: SearchSession,
) -> SearchOutcome {
    tracing::debug!(message, "search orchestrator starting");
    let now: DateTime<Utc> = Utc::now();

    if let Some(answer) = named_short_circuit(message) {
        return SearchOutcome {
            text: answer.to_string(),
            suppress_source_cards_ui: true,
            suppress_tool_activity_ui: true,
            session,
            tool_calls_made: 0,
            llm_round_trips: 0,
        };
    }

    let mode = classify_mode(message, Some(&session), now);
    let mut llm_round_trips = 0u32;
    let mut tool_calls_made = 0u32;

    if mode == SearchMode::FollowUp {
        match classify_follow_up(message) {
            FollowUpKind::DeepDive => {
                let primary_url = session
                    .primary_source_id
                    .as_ref()
                    .and_then(|id| session.last_results.iter().find(|s| &s.source_id == id))
                    .map(|s| s.url.clone());
                let Some(url) = primary_url else {
                    return fact_find_fallback(llm, client, session_id, message, session, now).await;
                };
                let args = serde_json::json!({ "url": url }).to_string();
                let ctx = CallContext { session_id: session_id.to_string(), capability: Some(Capability::BrowserControl), cancel: Arc::new(AtomicBool::new(false)) };
                let page = client.call("browser_navigate", &args, ctx).await;
                tool_calls_made += 1;
                let text = summarize(llm, message, &page, &[]).await;
                llm_round_trips += 1;
                session.updated_at = Some(now);
                return SearchOutcome { text, suppress_source_cards_ui: false, suppress_tool_activity_ui: false, session, tool_calls_made, llm_round_trips };
            }
            FollowUpKind::MoreSources => {
                let entity = ResolvedEntity {
                    name: session.last_entity_canonical.clone().unwrap_or_default(),
                    entity_type: if session.last_entity_canonical.is_some() { EntityType::Topic } else { EntityType::None },
                    hint: String::new(),
                };
                let built = build_query(llm, message, SearchMode::NewsAggregate, &entity).await;
                llm_round_trips += 1;
                return execute_search(llm, client, session_id, message, mode, built, entity, session, now, &mut llm_round_trips, &mut tool_calls_made).await;
            }
        }
    }

    let entity = resolve_entity(llm, message).await;
    llm_round_trips += 1;
    let built = build_query(llm, message, mode, &entity).await;
    llm_round_trips += 1;
    execute_search(llm, client, session_id, message, mode, built, entity, session, now, &mut llm_round_trips, &mut tool_calls_made).await
}

async fn fact_find_fallback(
    llm: &dyn LlmClient,
    client: &AuditedToolClient,
    session_id: &str,
    message: &str,
    session: SearchSession,
    now: DateTime<Utc>,
) -> SearchOutcome {
    let mut llm_round_trips = 0u32;
    let mut tool_calls_made = 0u32;
    let entity = resolve_entity(llm, message).await;
    llm_round_trips += 1;
    let built = build_query(llm, message, SearchMode::WebFactFind, &entity).await;
    llm_round_trips += 1;
    execute_search(llm, client, session_id, message, SearchMode::WebFactFind, built, entity, session, now, &mut llm_round_trips, &mut tool_calls_made).await
}

#[allow(clippy::too_many_arguments)]
async fn execute_search(
    llm: &dyn LlmClient,
    client: &AuditedToolClient,
    session_id: &str,
    message: &str,
    mode: SearchMode,
    built: BuiltQuery,
    entity: ResolvedEntity,
    mut session: SearchSession,
    now: DateTime<Utc>,
    llm_round_trips: &mut u32,
    tool_calls_made: &mut u32,
) -> SearchOutcome {
    let raw = call_web_search(client, session_id, &built.query, built.recency).await;
    *tool_calls_made += 1;
    let (body, mut parsed_sources) = parse_sources(&raw);

    if mode == SearchMode::NewsAggregate {
        let titles: Vec<String> = parsed_sources.iter().map(|s| s.title.clone()).collect();
        let clusters = clustering::cluster_titles(&titles);
        parsed_sources = clusters.into_iter().map(|c| parsed_sources[c.representative_index].clone()).collect();
    }

    if is_market_quote_query(message) {
        let stale = parsed_sources
            .first()
            .and_then(|s| s.published_at)
            .map(|published_at| now - published_at > Duration::hours(FRESHNESS_WINDOW_HOURS))
            .unwrap_or(true);
        if stale {
            let (suppress_cards, suppress_tools) = output_flags(mode);
            session.record(mode, built.query, built.recency, parsed_sources, entity_canonical(&entity), now);
            return SearchOutcome {
                text: "I cannot safely report a current market quote right now — the data I have is more than 12 hours old.".to_string(),
                suppress_source_cards_ui: suppress_cards,
                suppress_tool_activity_ui: suppress_tools,
                session,
                tool_calls_made: *tool_calls_made,
                llm_round_trips: *llm_round_trips,
            };
        }
    }

    let text = summarize(llm, message, &body, &parsed_sources).await;
    *llm_round_trips += 1;

    let (suppress_cards, suppress_tools) = output_flags(mode);
    session.record(mode, built.query, built.recency, parsed_sources, entity_canonical(&entity), now);

    SearchOutcome {
        text,
        suppress_source_cards_ui: suppress_cards,
        suppress_tool_activity_ui: suppress_tools,
        session,
        tool_calls_made: *tool_calls_made,
        llm_round_trips: *llm_round_trips,
    }
}

fn entity_canonical(entity: &ResolvedEntity) -> Option<String> {
    (!matches!(entity.entity_type, EntityType::None)).then(|| entity.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditSink;
    use crate::llm::{FinishReason, LlmResponse, LlmResult};
    use crate::permission::{ConfigPermissionGate, PermissionSetting};
    use crate::tool_client::ToolServer;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: Option<&[crate::model::ToolDefinition]>,
            _max_tokens_override: Option<u32>,
            _cancel: Arc<AtomicBool>,
        ) -> LlmResult<LlmResponse> {
            let text = self.responses.lock().unwrap().remove(0);
            Ok(LlmResponse { is_complete: true, content: Some(text), tool_calls: None, finish_reason: FinishReason::Stop })
        }
    }

    struct ScriptedServer(String);

    #[async_trait]
    impl ToolServer for ScriptedServer {
        async fn call(&self, _canonical_name: &str, _args_json: &str, _cancel: Arc<AtomicBool>) -> Result<String, String> {
            Ok(self.0.clone())
        }
        async fn list(&self) -> Vec<crate::model::ToolDefinition> {
            vec![]
        }
    }

    fn client(server: impl ToolServer + 'static) -> AuditedToolClient {
        AuditedToolClient::new(
            Arc::new(server),
            Arc::new(ConfigPermissionGate::new(PermissionSetting::Always)),
            Arc::new(InMemoryAuditSink::new()),
        )
    }

    #[tokio::test]
    async fn named_short_circuit_performs_no_search() {
        let llm = ScriptedLlm { responses: Mutex::new(vec![]) };
        let client = client(ScriptedServer("should not be called".to_string()));
        let outcome = run(&llm, &client, "s1", "what is the airspeed velocity of an unladen swallow?", SearchSession::default()).await;
        assert_eq!(outcome.tool_calls_made, 0);
        assert_eq!(outcome.llm_round_trips, 0);
        assert!(outcome.suppress_source_cards_ui);
        assert!(outcome.suppress_tool_activity_ui);
    }

    #[tokio::test]
    async fn web_fact_find_suppresses_both_ui_flags() {
        let llm = ScriptedLlm {
            responses: Mutex::new(vec![
                r#"{"name":"","type":"none","hint":""}"#.to_string(),
                r#"{"query":"president of france","recency":"any"}"#.to_string(),
                "France's president is Emmanuel Macron.".to_string(),
            ]),
        };
        let raw = format!(
            "Emmanuel Macron is the president of France.\n<!-- SOURCES_JSON -->\n[{{\"url\":\"https://a.com/x\",\"title\":\"Macron\"}}]"
        );
        let client = client(ScriptedServer(raw));
        let outcome = run(&llm, &client, "s1", "who is the president of france", SearchSession::default()).await;
        assert!(outcome.suppress_source_cards_ui);
        assert!(outcome.suppress_tool_activity_ui);
        assert_eq!(outcome.llm_round_trips, 3);
        assert_eq!(outcome.tool_calls_made, 1);
    }

    #[tokio::test]
    async fn news_aggregate_does_not_suppress_ui_flags() {
        let llm = ScriptedLlm {
            responses: Mutex::new(vec![
                r#"{"name":"","type":"none","hint":""}"#.to_string(),
                r#"{"query":"news today","recency":"day"}"#.to_string(),
                "Here's the news.".to_string(),
            ]),
        };
        let raw = "Top stories today.\n<!-- SOURCES_JSON -->\n[]".to_string();
        let client = client(ScriptedServer(raw));
        let outcome = run(&llm, &client, "s1", "what's the news today", SearchSession::default()).await;
        assert!(!outcome.suppress_source_cards_ui);
        assert!(!outcome.suppress_tool_activity_ui);
    }

    #[tokio::test]
    async fn stale_market_quote_returns_canned_warning_without_summarizing() {
        let llm = ScriptedLlm {
            responses: Mutex::new(vec![
                r#"{"name":"","type":"none","hint":""}"#.to_string(),
                r#"{"query":"dow jones today","recency":"day"}"#.to_string(),
            ]),
        };
        let stale_time = (Utc::now() - Duration::hours(20)).to_rfc3339();
        let raw = format!(
            "Dow Jones closed yesterday.\n<!-- SOURCES_JSON -->\n[{{\"url\":\"https://a.com/x\",\"title\":\"Dow\",\"published_at\":\"{stale_time}\"}}]"
        );
        let client = client(ScriptedServer(raw));
        let outcome = run(&llm, &client, "s1", "how is the dow jones doing today?", SearchSession::default()).await;
        assert!(outcome.text.contains("cannot safely report a current market quote"));
    }
}
