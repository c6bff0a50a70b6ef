//! The Orchestrator: the single entry point a turn goes through, from raw
//! user text to the data the outer layer (chat UI, CLI) renders.
//!
//! Ties together every other module in this crate: the Memory Context
//! Provider and Router run side by side, the Policy Gate turns the
//! Router's output into an exposed tool set, and the turn is dispatched to
//! exactly one of chat-only / the Search Orchestrator / the Tool Loop
//! Executor before a fixed output-contract pass cleans up the final text.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::audit::{actions, AuditEvent, AuditResult, AuditSink};
use crate::capability::{Capability, Intent, RouterOutput};
use crate::guardrails::{self, GuardrailsMode};
use crate::llm::LlmClient;
use crate::memory::{self, MemoryContextRequest, RetrievalMode};
use crate::model::ChatMessage;
use crate::policy_gate::{self, ToolCapabilityRegistry};
use crate::router::{self, SessionFlags};
use crate::search::{self, session::SearchSession};
use crate::tool_client::{AuditedToolClient, CallContext};
use crate::tool_loop;
use crate::utility::{self, DeterministicMatch, LastInlineAnswer};

/// Narrow continuity slots carried between turns in the same conversation.
/// Deliberately thin — this is not a general scratchpad, just what the
/// output-contract and follow-up logic need to stay coherent turn to turn.
#[derive(Debug, Clone, Default)]
pub struct DialogueState {
    pub topic: Option<String>,
    pub location_name: Option<String>,
    pub time_scope: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Everything the Orchestrator needs to remember between turns of one
/// conversation. Owned by the caller; `process` mutates it in place.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub search_session: SearchSession,
    pub dialogue_state: DialogueState,
    pub last_inline_answer: Option<LastInlineAnswer>,
    pub active_profile_id: Option<String>,
    pub turn_count: u32,
}

#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub text: String,
    pub success: bool,
    pub tool_calls_made: u32,
    pub llm_round_trips: u32,
    pub guardrails_used: bool,
    pub guardrails_rationale: Vec<String>,
    pub suppress_source_cards_ui: bool,
    pub suppress_tool_activity_ui: bool,
}

impl AgentResponse {
    fn rejected(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: false,
            tool_calls_made: 0,
            llm_round_trips: 0,
            guardrails_used: false,
            guardrails_rationale: Vec::new(),
            suppress_source_cards_ui: false,
            suppress_tool_activity_ui: false,
        }
    }
}

pub struct Orchestrator {
    pub llm: Arc<dyn LlmClient>,
    pub tool_client: Arc<AuditedToolClient>,
    pub registry: ToolCapabilityRegistry,
    pub sink: Arc<dyn AuditSink>,
    pub memory_enabled: bool,
    pub guardrails_mode: GuardrailsMode,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, tool_client: Arc<AuditedToolClient>, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            llm,
            tool_client,
            registry: ToolCapabilityRegistry::new(),
            sink,
            memory_enabled: true,
            guardrails_mode: GuardrailsMode::Auto,
        }
    }

    #[tracing::instrument(skip(self, state, user_message), fields(session_id, turn = state.turn_count))]
    pub async fn process(&self, session_id: &str, state: &mut SessionState, user_message: &str) -> AgentResponse {
        tracing::debug!(user_message, "processing turn");
        if user_message.trim().is_empty() {
            return AgentResponse::rejected("Empty message");
        }

        let now = Utc::now();
        let is_cold_greeting = state.turn_count == 0;
        let has_recent_search_session = state.search_session.has_recent_results(now);

        let memory_req = MemoryContextRequest {
            user_message,
            memory_enabled: self.memory_enabled,
            is_cold_greeting,
            active_profile_id: state.active_profile_id.as_deref(),
            timeout: if is_cold_greeting { RetrievalMode::Greet.default_timeout() } else { RetrievalMode::Normal.default_timeout() },
        };

        let (memory_result, router_output) = tokio::join!(
            memory::get_context(&self.tool_client, &self.sink, session_id, memory_req),
            router::route(user_message, SessionFlags { has_recent_search_session }, self.llm.as_ref()),
        );

        tracing::info!(intent = ?router_output.intent, confidence = router_output.confidence, "turn routed");
        self.sink
            .append(
                AuditEvent::new(session_id, actions::ROUTER_OUTPUT, "router", AuditResult::Ok)
                    .with_detail("intent", format!("{:?}", router_output.intent))
                    .with_detail("confidence", router_output.confidence)
                    .with_detail("needs_web", router_output.needs_web),
            )
            .await;

        state.turn_count += 1;
        let mut tool_calls_made = if memory_result.provenance.skipped { 0 } else { 1 };

        if router_output.intent == Intent::UtilityDeterministic {
            return self.handle_deterministic(session_id, state, user_message, &mut tool_calls_made).await;
        }

        if router_output.intent == Intent::MemoryRead {
            let text = if memory_result.pack_text.trim().is_empty() {
                "I don't have anything saved about you yet.".to_string()
            } else {
                memory_result.pack_text.clone()
            };
            return self.finish(text, true, tool_calls_made, 0, false, Vec::new(), false, false, session_id, user_message).await;
        }

        let policy = policy_gate::policy_for(&router_output, has_recent_search_session);
        self.sink
            .append(
                AuditEvent::new(session_id, actions::POLICY_DECISION, "policy_gate", AuditResult::Ok)
                    .with_detail("use_tool_loop", policy.use_tool_loop)
                    .with_detail("allowed_capabilities", format!("{:?}", policy.allowed_capabilities)),
            )
            .await;

        if router_output.intent.is_search() {
            return self.handle_search(session_id, state, user_message, tool_calls_made).await;
        }

        if policy.use_tool_loop {
            return self.handle_tool_loop(session_id, state, user_message, &memory_result, &router_output, &policy, tool_calls_made).await;
        }

        self.handle_chat_only(session_id, state, user_message, &memory_result, &router_output, tool_calls_made).await
    }

    async fn handle_deterministic(
        &self,
        session_id: &str,
        state: &mut SessionState,
        user_message: &str,
        tool_calls_made: &mut u32,
    ) -> AgentResponse {
        match utility::match_message(user_message, state.last_inline_answer.clone()) {
            Some(DeterministicMatch::Inline { answer_text, .. }) => {
                state.last_inline_answer = utility::last_inline_answer_from(user_message);
                self.finish(answer_text, true, *tool_calls_made, 0, false, Vec::new(), true, true, session_id, user_message).await
            }
            Some(DeterministicMatch::Tool { tool_name, tool_args_json, .. }) => {
                let ctx = CallContext { session_id: session_id.to_string(), capability: Some(Capability::DeterministicUtility), cancel: Arc::new(AtomicBool::new(false)) };
                let result = self.tool_client.call(&tool_name, &tool_args_json, ctx).await;
                *tool_calls_made += 1;
                self.finish(result, true, *tool_calls_made, 0, false, Vec::new(), true, true, session_id, user_message).await
            }
            None => {
                // The deterministic-utility shortcut was taken by the Router
                // but the Deterministic Utility Engine no longer agrees —
                // fall back to a plain chat turn rather than fail the whole turn.
                let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user_message)];
                let text = match self.llm.chat(&messages, None, None, Arc::new(AtomicBool::new(false))).await {
                    Ok(response) => response.content.unwrap_or_default(),
                    Err(_) => "I ran into a problem answering that. Please try again.".to_string(),
                };
                self.finish(text, true, *tool_calls_made, 1, false, Vec::new(), false, false, session_id, user_message).await
            }
        }
    }

    async fn handle_search(&self, session_id: &str, state: &mut SessionState, user_message: &str, tool_calls_made: u32) -> AgentResponse {
        let outcome = search::run(self.llm.as_ref(), &self.tool_client, session_id, user_message, state.search_session.clone()).await;
        state.search_session = outcome.session;
        self.finish(
            outcome.text,
            true,
            tool_calls_made + outcome.tool_calls_made,
            outcome.llm_round_trips,
            false,
            Vec::new(),
            outcome.suppress_source_cards_ui,
            outcome.suppress_tool_activity_ui,
            session_id,
            user_message,
        )
        .await
    }

    async fn handle_tool_loop(
        &self,
        session_id: &str,
        _state: &mut SessionState,
        user_message: &str,
        memory_result: &memory::MemoryContextResult,
        _router_output: &RouterOutput,
        policy: &crate::capability::Policy,
        tool_calls_made: u32,
    ) -> AgentResponse {
        let available = self.tool_client.list().await;
        let exposed = policy_gate::filter_tools(&available, policy, &self.registry);
        let history = self.seed_history(memory_result, user_message);
        let result = tool_loop::run(
            self.llm.as_ref(),
            &self.tool_client,
            &self.registry,
            session_id,
            history,
            exposed,
            Arc::new(AtomicBool::new(false)),
        )
        .await;
        let text = result.history.last().and_then(|m| m.content.clone()).unwrap_or_default();
        let executed = result.records.iter().filter(|r| r.outcome == crate::model::ToolCallOutcome::Success).count() as u32;
        self.finish(
            text,
            result.success,
            tool_calls_made + executed,
            result.rounds_used,
            false,
            Vec::new(),
            false,
            false,
            session_id,
            user_message,
        )
        .await
    }

    async fn handle_chat_only(
        &self,
        session_id: &str,
        _state: &mut SessionState,
        user_message: &str,
        memory_result: &memory::MemoryContextResult,
        router_output: &RouterOutput,
        tool_calls_made: u32,
    ) -> AgentResponse {
        let complex_hint = router_output.intent == Intent::GeneralTool || router_output.confidence < 0.85;
        if guardrails::should_run(self.guardrails_mode, complex_hint) {
            let outcome = guardrails::run(self.llm.as_ref(), user_message).await;
            if outcome.used {
                return self
                    .finish(outcome.text, true, tool_calls_made, 4, true, outcome.rationale, false, false, session_id, user_message)
                    .await;
            }
        }

        let history = self.seed_history(memory_result, user_message);
        let text = match self.llm.chat(&history, None, None, Arc::new(AtomicBool::new(false))).await {
            Ok(response) => response.content.unwrap_or_default(),
            Err(_) => "I ran into a problem answering that. Please try again.".to_string(),
        };
        self.finish(text, true, tool_calls_made, 1, false, Vec::new(), false, false, session_id, user_message).await
    }

    fn seed_history(&self, memory_result: &memory::MemoryContextResult, user_message: &str) -> Vec<ChatMessage> {
        let mut history = Vec::new();
        if memory_result.pack_text.trim().is_empty() {
            history.push(ChatMessage::system(SYSTEM_PROMPT));
        } else {
            history.push(ChatMessage::system(format!("{SYSTEM_PROMPT}\n\nWhat you know about the user:\n{}", memory_result.pack_text)));
        }
        history.push(ChatMessage::user(user_message));
        history
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        text: String,
        success: bool,
        tool_calls_made: u32,
        llm_round_trips: u32,
        guardrails_used: bool,
        guardrails_rationale: Vec<String>,
        suppress_source_cards_ui: bool,
        suppress_tool_activity_ui: bool,
        session_id: &str,
        user_message: &str,
    ) -> AgentResponse {
        let text = enforce_output_contract(&self.sink, session_id, user_message, text).await;
        AgentResponse {
            text,
            success,
            tool_calls_made,
            llm_round_trips,
            guardrails_used,
            guardrails_rationale,
            suppress_source_cards_ui,
            suppress_tool_activity_ui,
        }
    }
}

const SYSTEM_PROMPT: &str = "You are a local AI assistant. Answer directly and do not narrate your own reasoning process.";

const PROMPT_LEAK_MARKERS: &[&str] = &["now they're asking", "no fluff", "my real name is"];
const ROLE_CONFUSION_PREFIXES: &[&str] = &["user:", "human:"];
const ABUSIVE_MARKERS: &[&str] = &["you're an idiot", "you are stupid", "shut up"];
const UNSAFE_MIRROR_MARKERS: &[&str] = &["here's how to make a bomb", "here's how to hurt"];
const INTERNAL_MARKERS: &[&str] = &["<!-- sources_json -->", "[internal]", "<|", "|>"];

/// The seven-step output-contract pass every turn's final text goes
/// through before it reaches the caller, in the fixed order spec'd: leak
/// trimming, role-confusion rewrite, off-topic-calculator rewrite, abusive
/// boundary, unsafe-mirroring override, capability stripping, marker
/// stripping.
async fn enforce_output_contract(sink: &Arc<dyn AuditSink>, session_id: &str, user_message: &str, mut text: String) -> String {
    text = trim_prompt_leak(&text);

    if let Some(rewritten) = rewrite_role_confusion(&text) {
        sink.append(AuditEvent::new(session_id, actions::AGENT_ROLE_CONFUSION_REWRITE, "output_contract", AuditResult::Ok)).await;
        text = rewritten;
    }

    if let Some(rewritten) = rewrite_offtopic_calc(user_message, &text) {
        sink.append(AuditEvent::new(session_id, actions::AGENT_OFFTOPIC_CALC_REWRITE, "output_contract", AuditResult::Ok)).await;
        text = rewritten;
    }

    if is_abusive(user_message) {
        sink.append(AuditEvent::new(session_id, actions::AGENT_ABUSIVE_USER_BOUNDARY, "output_contract", AuditResult::Ok)).await;
        text = "I'm going to stay focused on helping — let's keep this civil.".to_string();
    }

    if mirrors_unsafe_content(&text) {
        sink.append(AuditEvent::new(session_id, actions::AGENT_SAFETY_OVERRIDE, "output_contract", AuditResult::Ok)).await;
        text = "I can't help with that.".to_string();
    }

    text = strip_unsupported_capability_markup(&text);
    text = strip_internal_markers(&text);
    text
}

/// Drops any second-or-later paragraph that reads as self-referential
/// instruction leakage. The first paragraph is always kept, even if it
/// happens to match — a leak worth trimming shows up as the model
/// drifting into leakage after its real answer, not as the answer itself.
fn trim_prompt_leak(text: &str) -> String {
    let paragraphs: Vec<&str> = text.split("\n\n").collect();
    let Some((first, rest)) = paragraphs.split_first() else {
        return text.trim().to_string();
    };
    let mut kept = vec![*first];
    for paragraph in rest {
        let lower = paragraph.to_ascii_lowercase();
        if PROMPT_LEAK_MARKERS.iter().any(|marker| lower.contains(marker)) {
            continue;
        }
        kept.push(paragraph);
    }
    kept.join("\n\n").trim().to_string()
}

fn rewrite_role_confusion(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    let lower = trimmed.to_ascii_lowercase();
    if ROLE_CONFUSION_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
        let after_colon = trimmed.split_once(':').map(|(_, rest)| rest.trim()).unwrap_or(trimmed);
        Some(after_colon.to_string())
    } else {
        None
    }
}

fn rewrite_offtopic_calc(user_message: &str, text: &str) -> Option<String> {
    let looks_like_calc_leftover = text.contains("= **") && text.trim_end().ends_with("**");
    let user_asked_for_math = user_message.chars().any(|c| c.is_ascii_digit()) && user_message.contains(|c: char| "+-*/x".contains(c));
    if looks_like_calc_leftover && !user_asked_for_math {
        Some(text.split("= **").next().unwrap_or(text).trim().to_string())
    } else {
        None
    }
}

fn is_abusive(user_message: &str) -> bool {
    let lower = user_message.to_ascii_lowercase();
    ABUSIVE_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn mirrors_unsafe_content(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    UNSAFE_MIRROR_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn strip_unsupported_capability_markup(text: &str) -> String {
    const MARKER: &str = "```tool_call";
    let mut out = text.to_string();
    while let Some(start) = out.find(MARKER) {
        let search_from = start + MARKER.len();
        // Look for the *closing* fence after the opening one, not the
        // opening fence itself (out[start..] always starts with MARKER).
        let Some(close_offset) = out[search_from..].find("```") else { break };
        let end = search_from + close_offset + 3;
        out.replace_range(start..end.min(out.len()), "");
    }
    out.trim().to_string()
}

fn strip_internal_markers(text: &str) -> String {
    let mut out = text.to_string();
    for marker in INTERNAL_MARKERS {
        while let Some(idx) = out.to_ascii_lowercase().find(marker) {
            out.replace_range(idx..idx + marker.len(), "");
        }
    }
    out.trim().to_string()
}
