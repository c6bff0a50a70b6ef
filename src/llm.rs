//! The LLM transport client: an external interface (spec.md §1), defined
//! here only as the trait the rest of the crate calls against, plus the one
//! piece of client-side behavior spec.md §6 makes mandatory rather than an
//! implementation detail — self-healing retry on a known backend bug and
//! history normalization when no tools are offered.
//!
//! The retry-then-fallback wrapper shape is grounded on the teacher's
//! `ai::providers::reliable::ReliableProvider`, narrowed from "retry N
//! times with backoff, then try fallbacks" down to the single documented
//! retry spec.md actually specifies.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{ChatMessage, ChatRole, ToolCallRequest, ToolDefinition};

pub type LlmResult<T> = Result<T, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub is_complete: bool,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    pub finish_reason: FinishReason,
}

impl LlmResponse {
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        max_tokens_override: Option<u32>,
        cancel: Arc<AtomicBool>,
    ) -> LlmResult<LlmResponse>;
}

/// The one backend bug class spec.md §6 calls out by name: an HTTP 400
/// whose body contains this substring means "retry once without optional
/// extras (stop sequences, repetition penalty)". Any other error surfaces
/// as-is.
const REGEX_BUG_MARKER: &str = "Failed to process regex";

/// Wraps any [`LlmClient`] with the self-healing retry and history
/// normalization spec.md §6 requires of the transport client.
pub struct SelfHealingLlmClient<C: LlmClient> {
    inner: C,
}

impl<C: LlmClient> SelfHealingLlmClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: LlmClient> LlmClient for SelfHealingLlmClient<C> {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        max_tokens_override: Option<u32>,
        cancel: Arc<AtomicBool>,
    ) -> LlmResult<LlmResponse> {
        let normalized = normalize_history(messages, tools);
        match self.inner.chat(&normalized, tools, max_tokens_override, cancel.clone()).await {
            Ok(response) => Ok(response),
            Err(err) if is_regex_bug(&err) => {
                // Retry once "without optional extras" — this client has no
                // extras of its own to drop, so the retry is a clean resend;
                // a concrete transport would strip stop sequences /
                // repetition penalty here before calling `inner` again.
                self.inner.chat(&normalized, tools, max_tokens_override, cancel).await
            }
            Err(err) => Err(err),
        }
    }
}

fn is_regex_bug(err: &str) -> bool {
    err.contains("400") && err.contains(REGEX_BUG_MARKER)
}

/// When no tools are offered on the current call, inbound history that
/// still carries tool-call scaffolding (assistant-tool-calls / tool-result
/// messages) is collapsed into a plain alternating system/user/assistant
/// sequence, per spec.md §6.
pub fn normalize_history(messages: &[ChatMessage], tools: Option<&[ToolDefinition]>) -> Vec<ChatMessage> {
    if tools.is_some_and(|t| !t.is_empty()) {
        return messages.to_vec();
    }
    let mut normalized = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role {
            ChatRole::System | ChatRole::User | ChatRole::Assistant => normalized.push(message.clone()),
            ChatRole::AssistantToolCalls => {
                if let Some(content) = &message.content {
                    normalized.push(ChatMessage::assistant(content.clone()));
                }
                // A pure tool-calls message with no text collapses away entirely.
            }
            ChatRole::Tool => {
                if let Some(content) = &message.content {
                    normalized.push(ChatMessage::user(format!("[tool result] {content}")));
                }
            }
        }
    }
    normalized
}
