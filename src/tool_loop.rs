//! The Tool Loop Executor: drives bounded rounds against the LLM, filtering
//! model-requested calls against the exposed tool set, resolving conflicts
//! between simultaneously requested tools, executing eligible calls
//! concurrently, and re-inserting results into history in a deterministic
//! order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;

use crate::llm::LlmClient;
use crate::model::{ChatMessage, ToolCallOutcome, ToolCallRecord, ToolCallRequest, ToolDefinition};
use crate::policy_gate::ToolCapabilityRegistry;
use crate::tool_client::{AuditedToolClient, CallContext};

/// Typical cap on LLM round-trips within one tool loop.
pub const MAX_ROUNDS: u32 = 10;

/// Pairs of (loser, winner) tool names that overlap semantically on the
/// same intent. When both are requested in the same round, the loser is
/// skipped with `tool_conflict_skipped: deterministic_priority`.
///
/// Seeded from the one documented pair; expected to grow from product
/// telemetry (see the Router/Policy Gate open questions).
// TODO: add further conflict pairs as they're identified (see spec's open
// questions on the conflict-resolution priority table).
const CONFLICT_PRIORITY: &[(&str, &str)] = &[("screen_capture", "get_active_window")];

pub struct ToolLoopResult {
    pub history: Vec<ChatMessage>,
    pub records: Vec<ToolCallRecord>,
    pub rounds_used: u32,
    pub success: bool,
}

fn is_conflict_loser(name: &str, eligible_names: &[String]) -> bool {
    CONFLICT_PRIORITY
        .iter()
        .any(|(loser, winner)| *loser == name && eligible_names.iter().any(|n| n == winner))
}

#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip(llm, client, registry, history, exposed_tools, cancel), fields(session_id, exposed = exposed_tools.len()))]
pub async fn run(
    llm: &dyn LlmClient,
    client: &AuditedToolClient,
    registry: &ToolCapabilityRegistry,
    session_id: &str,
    mut history: Vec<ChatMessage>,
    exposed_tools: Vec<ToolDefinition>,
    cancel: Arc<AtomicBool>,
) -> ToolLoopResult {
    let mut records = Vec::new();
    let exposed_names: std::collections::HashSet<String> = exposed_tools.iter().map(|t| client.canonicalize(&t.name)).collect();

    for round in 0..MAX_ROUNDS {
        if cancel.load(Ordering::SeqCst) {
            return ToolLoopResult { history, records, rounds_used: round, success: false };
        }

        let tools_opt = if exposed_tools.is_empty() { None } else { Some(exposed_tools.as_slice()) };
        let response = match llm.chat(&history, tools_opt, None, cancel.clone()).await {
            Ok(response) => response,
            Err(_) => {
                history.push(ChatMessage::assistant("I ran into a problem reaching the model. Please try again."));
                return ToolLoopResult { history, records, rounds_used: round + 1, success: false };
            }
        };

        if !response.has_tool_calls() {
            let text = response.content.unwrap_or_default();
            history.push(ChatMessage::assistant(text));
            tracing::info!(rounds_used = round + 1, "tool loop finished");
            return ToolLoopResult { history, records, rounds_used: round + 1, success: true };
        }

        let requested = response.tool_calls.unwrap_or_default();
        history.push(ChatMessage::assistant_tool_calls(requested.clone()));

        let mut eligible: Vec<ToolCallRequest> = Vec::new();
        let mut round_records: Vec<ToolCallRecord> = Vec::new();

        for call in requested {
            let canonical = client.canonicalize(&call.name);
            if !exposed_names.contains(&canonical) {
                round_records.push(ToolCallRecord::skipped(
                    call,
                    ToolCallOutcome::ToolNotPermitted,
                    format!("Tool call blocked: {canonical} is not exposed for this turn"),
                ));
                continue;
            }
            eligible.push(call);
        }

        let eligible_names: Vec<String> = eligible.iter().map(|c| client.canonicalize(&c.name)).collect();
        let mut surviving: Vec<ToolCallRequest> = Vec::new();
        for call in eligible {
            let canonical = client.canonicalize(&call.name);
            if is_conflict_loser(&canonical, &eligible_names) {
                round_records.push(ToolCallRecord::skipped(
                    call,
                    ToolCallOutcome::ToolConflictSkippedDeterministicPriority,
                    "skipped: a higher-priority tool covers the same request this round".to_string(),
                ));
                continue;
            }
            surviving.push(call);
        }

        let futures = surviving.into_iter().map(|call| {
            let canonical = client.canonicalize(&call.name);
            let capability = registry.capability_for(&canonical);
            let ctx = CallContext { session_id: session_id.to_string(), capability, cancel: cancel.clone() };
            async move {
                let started_at = chrono::Utc::now();
                let result = client.call(&call.name, &call.arguments_json, ctx).await;
                let success = !result.starts_with("Tool call blocked:") && !result.starts_with("Tool execution failed:");
                let outcome = if success { ToolCallOutcome::Success } else if result.starts_with("Tool call blocked:") {
                    ToolCallOutcome::Blocked
                } else {
                    ToolCallOutcome::ExecutionFailed
                };
                ToolCallRecord { request: call, result, success, outcome, started_at, duration_ms: 0 }
            }
        });

        let mut executed = join_all(futures).await;
        executed.sort_by(|a, b| a.request.id.cmp(&b.request.id));
        for record in &executed {
            history.push(ChatMessage::tool_result(&record.request.id, &record.result));
        }
        round_records.extend(executed);
        round_records.sort_by(|a, b| a.request.id.cmp(&b.request.id));
        records.extend(round_records);
    }

    tracing::warn!(rounds_used = MAX_ROUNDS, "tool loop exhausted its round budget");
    history.push(ChatMessage::assistant(
        "I've reached the maximum tool rounds for this turn and need to stop here.".to_string(),
    ));
    ToolLoopResult { history, records, rounds_used: MAX_ROUNDS, success: false }
}
