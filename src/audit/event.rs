//! The audit event shape (spec.md §3, §6) and the fixed action names the
//! rest of the crate emits.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of the action an audit event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Pending,
    Ok,
    Error,
    Denied,
    Blocked,
}

/// One append-only audit record. Field names are snake_case per spec.md §6
/// so the JSONL sink round-trips without a rename layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub ts: DateTime<Utc>,
    pub event_version: u32,
    pub actor: String,
    pub action: String,
    pub target: String,
    pub result: AuditResult,
    pub details: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_token_id: Option<String>,
}

pub const CURRENT_EVENT_VERSION: u32 = 1;

impl AuditEvent {
    pub fn new(actor: impl Into<String>, action: impl Into<String>, target: impl Into<String>, result: AuditResult) -> Self {
        Self {
            ts: Utc::now(),
            event_version: CURRENT_EVENT_VERSION,
            actor: actor.into(),
            action: action.into(),
            target: target.into(),
            result,
            details: BTreeMap::new(),
            permission_token_id: None,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_permission_token(mut self, token_id: impl Into<String>) -> Self {
        self.permission_token_id = Some(token_id.into());
        self
    }
}

/// Fixed action names referenced directly by spec.md.
pub mod actions {
    pub const MCP_TOOL_CALL_START: &str = "MCP_TOOL_CALL_START";
    pub const MCP_TOOL_CALL_END: &str = "MCP_TOOL_CALL_END";
    pub const MEMORY_RETRIEVED: &str = "MEMORY_RETRIEVED";
    pub const ROUTER_OUTPUT: &str = "ROUTER_OUTPUT";
    pub const POLICY_DECISION: &str = "POLICY_DECISION";
    pub const AGENT_ROLE_CONFUSION_REWRITE: &str = "AGENT_ROLE_CONFUSION_REWRITE";
    pub const AGENT_OFFTOPIC_CALC_REWRITE: &str = "AGENT_OFFTOPIC_CALC_REWRITE";
    pub const AGENT_ABUSIVE_USER_BOUNDARY: &str = "AGENT_ABUSIVE_USER_BOUNDARY";
    pub const AGENT_SAFETY_OVERRIDE: &str = "AGENT_SAFETY_OVERRIDE";
    pub const AGENT_TURN_FAILED: &str = "AGENT_TURN_FAILED";
}
