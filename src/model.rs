//! Shared data model: chat history, tool definitions, and call records.
//!
//! These types are the immutable values spec.md §3 describes. Everything
//! here is `Clone + Serialize + Deserialize` so it can cross an `await`
//! point, be logged, or be handed to a test double without ceremony —
//! the same posture the teacher's `ai::types` module takes with `Message`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One message in a chat history.
///
/// `tool` messages reference the `assistant_tool_calls` message whose
/// `tool_calls` entry they answer via `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
    AssistantToolCalls,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: Some(content.into()), tool_call_id: None, tool_calls: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: Some(content.into()), tool_call_id: None, tool_calls: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: Some(content.into()), tool_call_id: None, tool_calls: None }
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self { role: ChatRole::AssistantToolCalls, content: None, tool_call_id: None, tool_calls: Some(calls) }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }
}

/// A tool advertised by the tool server, after name canonicalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

/// A tool invocation the model requested, before execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments_json: String,
}

/// Outcome categories for a completed (or skipped) tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallOutcome {
    Success,
    ToolNotPermitted,
    ToolConflictSkippedDeterministicPriority,
    ExecutionFailed,
    Blocked,
}

/// The appended record of a tool call once it has run (or been skipped).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub request: ToolCallRequest,
    pub result: String,
    pub success: bool,
    pub outcome: ToolCallOutcome,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ToolCallRecord {
    pub fn skipped(request: ToolCallRequest, outcome: ToolCallOutcome, message: impl Into<String>) -> Self {
        Self {
            request,
            result: message.into(),
            success: false,
            outcome,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_constructors_set_expected_role() {
        assert_eq!(ChatMessage::system("hi").role, ChatRole::System);
        assert_eq!(ChatMessage::user("hi").role, ChatRole::User);
        assert_eq!(ChatMessage::assistant("hi").role, ChatRole::Assistant);
    }

    #[test]
    fn tool_result_carries_call_id() {
        let msg = ChatMessage::tool_result("call_1", "42");
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.content.as_deref(), Some("42"));
    }

    #[test]
    fn assistant_tool_calls_has_no_content() {
        let msg = ChatMessage::assistant_tool_calls(vec![ToolCallRequest {
            id: "call_1".into(),
            name: "web_search".into(),
            arguments_json: "{}".into(),
        }]);
        assert!(msg.content.is_none());
        assert_eq!(msg.tool_calls.unwrap().len(), 1);
    }
}
