//! The Audited Tool Client: the only path through which the rest of the
//! crate touches the (external, out-of-scope) tool server.
//!
//! Grounded on the teacher's `AgentLoop::execute_tool_call` — risk
//! classification before execution, an `ApprovalNeeded`-with-timeout path
//! for calls that need a human yes/no, and per-call audit emission around
//! the actual dispatch — reshaped to spec.md §4.1's five numbered steps.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;

use crate::audit::{actions, AuditEvent, AuditResult, AuditSink};
use crate::capability::Capability;
use crate::error::ToolClientError;
use crate::model::ToolDefinition;
use crate::permission::{PermissionDecision, PermissionGate, ToolGroup};
use crate::redaction::{redact_output, summarize_bulky_output, summary_kind_for_tool};

/// How long the Audited Tool Client waits on a `Prompt` decision before
/// treating it as a denial. Mirrors the teacher's 30-second
/// `ApprovalNeeded` timeout.
pub const APPROVAL_TIMEOUT: Duration = Duration::from_secs(30);

/// The external tool server. Errors are thrown on the other side of this
/// trait (spec.md §6); every error type it can raise collapses to a single
/// string here, which the Audited Tool Client further wraps.
#[async_trait]
pub trait ToolServer: Send + Sync {
    async fn call(&self, canonical_name: &str, args_json: &str, cancel: Arc<AtomicBool>) -> Result<String, String>;
    async fn list(&self) -> Vec<ToolDefinition>;
}

/// Resolves a `Prompt` permission decision by asking something outside this
/// crate (a UI, a CLI confirmation) whether to proceed. Out of scope per
/// spec.md §1; this trait is the seam a caller plugs an implementation into.
#[async_trait]
pub trait Approver: Send + Sync {
    async fn approve(&self, canonical_name: &str, args_json: &str) -> bool;
}

/// An `Approver` that always denies — the conservative default when no UI
/// is wired up.
pub struct AlwaysDenyApprover;

#[async_trait]
impl Approver for AlwaysDenyApprover {
    async fn approve(&self, _canonical_name: &str, _args_json: &str) -> bool {
        false
    }
}

/// Per-call context the Audited Tool Client needs beyond the call itself.
pub struct CallContext {
    pub session_id: String,
    pub capability: Option<Capability>,
    pub cancel: Arc<AtomicBool>,
}

pub struct AuditedToolClient {
    server: Arc<dyn ToolServer>,
    permission_gate: Arc<dyn PermissionGate>,
    approver: Arc<dyn Approver>,
    sink: Arc<dyn AuditSink>,
    aliases: HashMap<String, String>,
}

impl AuditedToolClient {
    pub fn new(server: Arc<dyn ToolServer>, permission_gate: Arc<dyn PermissionGate>, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            server,
            permission_gate,
            approver: Arc::new(AlwaysDenyApprover),
            sink,
            aliases: default_aliases(),
        }
    }

    pub fn with_approver(mut self, approver: Arc<dyn Approver>) -> Self {
        self.approver = approver;
        self
    }

    /// `list()` passes through unchanged and writes no audit events
    /// (spec.md §4.1).
    pub async fn list(&self) -> Vec<ToolDefinition> {
        self.server.list().await
    }

    pub fn canonicalize(&self, name: &str) -> String {
        let snake = to_snake_case(name);
        self.aliases.get(&snake).cloned().unwrap_or(snake)
    }

    /// Executes one tool call, returning the text that should be fed back
    /// to the model. Never panics and never returns an `Err` for a denied
    /// or failed call — those become user-visible strings per spec.md §4.1,
    /// matching the teacher's "never surface an exception, fold it into a
    /// message" posture.
    #[tracing::instrument(skip(self, args_json, ctx), fields(session_id = %ctx.session_id, canonical_name))]
    pub async fn call(&self, requested_name: &str, args_json: &str, ctx: CallContext) -> String {
        let canonical_name = self.canonicalize(requested_name);
        tracing::Span::current().record("canonical_name", canonical_name.as_str());
        let request_id = uuid::Uuid::new_v4().to_string();
        let started_at = Instant::now();
        tracing::debug!(args = args_summary(args_json), "dispatching tool call");

        self.sink
            .append(
                AuditEvent::new(&ctx.session_id, actions::MCP_TOOL_CALL_START, &canonical_name, AuditResult::Pending)
                    .with_detail("request_id", request_id.clone())
                    .with_detail("args_summary", args_summary(args_json)),
            )
            .await;

        let group = ctx.capability.and_then(ToolGroup::for_capability);
        match self.permission_gate.check(group, &canonical_name).await {
            PermissionDecision::Deny(reason) => {
                self.emit_end(&ctx.session_id, &request_id, &canonical_name, started_at, AuditResult::Blocked, None, Some(&reason))
                    .await;
                return format!("Tool call blocked: {reason}");
            }
            PermissionDecision::Prompt => {
                let approved = match tokio::time::timeout(APPROVAL_TIMEOUT, self.approver.approve(&canonical_name, args_json)).await {
                    Ok(approved) => approved,
                    Err(_) => false, // timed out — deny
                };
                if !approved {
                    let reason = "approval denied or timed out";
                    self.emit_end(&ctx.session_id, &request_id, &canonical_name, started_at, AuditResult::Blocked, None, Some(reason))
                        .await;
                    return format!("Tool call blocked: {reason}");
                }
            }
            PermissionDecision::Grant { .. } => {}
        }

        let outcome = self.server.call(&canonical_name, args_json, ctx.cancel).await;
        match outcome {
            Ok(raw) => {
                let logged = summary_kind_for_tool(&canonical_name)
                    .map(|kind| summarize_bulky_output(kind, &raw))
                    .unwrap_or_else(|| redact_output(&raw));
                self.emit_end(&ctx.session_id, &request_id, &canonical_name, started_at, AuditResult::Ok, Some(&logged), None)
                    .await;
                raw
            }
            Err(message) => {
                let err = ToolClientError::ExecutionFailed(message);
                self.emit_end(&ctx.session_id, &request_id, &canonical_name, started_at, AuditResult::Error, None, Some(&err.to_string()))
                    .await;
                err.to_string()
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn emit_end(
        &self,
        session_id: &str,
        request_id: &str,
        canonical_name: &str,
        started_at: Instant,
        result: AuditResult,
        output_summary: Option<&str>,
        error_message: Option<&str>,
    ) {
        let mut event = AuditEvent::new(session_id, actions::MCP_TOOL_CALL_END, canonical_name, result)
            .with_detail("request_id", request_id)
            .with_detail("duration_ms", started_at.elapsed().as_millis() as u64)
            .with_detail("ts_end", Utc::now().to_rfc3339());
        if let Some(summary) = output_summary {
            event = event.with_detail("output_summary", summary);
        }
        if let Some(message) = error_message {
            event = event.with_detail("error_message", message);
        }
        self.sink.append(event).await;
    }
}

fn args_summary(args_json: &str) -> String {
    const MAX: usize = 200;
    if args_json.chars().count() <= MAX {
        args_json.to_string()
    } else {
        let truncated: String = args_json.chars().take(MAX).collect();
        format!("{truncated}…")
    }
}

/// PascalCase/camelCase/kebab-case → snake_case.
fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower_or_digit = false;
    for c in name.chars() {
        if c == '-' || c == ' ' {
            out.push('_');
            prev_lower_or_digit = false;
            continue;
        }
        if c.is_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower_or_digit = false;
        } else {
            out.push(c);
            prev_lower_or_digit = c.is_alphanumeric();
        }
    }
    out
}

fn default_aliases() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("get_screen".to_string(), "screen_capture".to_string());
    m.insert("capture_screen".to_string(), "screen_capture".to_string());
    m.insert("read_file".to_string(), "file_read".to_string());
    m.insert("search_web".to_string(), "web_search".to_string());
    m
}
