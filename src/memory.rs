//! The Memory Context Provider: pre-fetches a bounded memory "pack" through
//! the Audited Tool Client with a hard deadline, and always returns a typed
//! result — failures and timeouts carry provenance, never an exception.
//!
//! There is no separate memory-backend trait here: the memory backend is an
//! external collaborator reached only through the `memory_retrieve` tool,
//! the same path every other tool call takes.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audit::{actions, AuditEvent, AuditResult, AuditSink};
use crate::capability::Capability;
use crate::tool_client::{AuditedToolClient, CallContext};

/// Which deadline profile a call used — cold greetings get a shorter one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Greet,
    Normal,
}

impl RetrievalMode {
    /// Default wall-clock budget for this mode (500ms cold greeting, 2s otherwise).
    pub fn default_timeout(self) -> Duration {
        match self {
            RetrievalMode::Greet => Duration::from_millis(500),
            RetrievalMode::Normal => Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryProvenance {
    pub source_tool: String,
    pub retrieval_mode: RetrievalMode,
    pub success: bool,
    pub timed_out: bool,
    pub skipped: bool,
    pub facts: u32,
    pub events: u32,
    pub chunks: u32,
    pub nuggets: u32,
    pub has_profile: bool,
    pub summary: Option<String>,
}

impl MemoryProvenance {
    fn skipped(mode: RetrievalMode) -> Self {
        Self {
            source_tool: "memory_retrieve".to_string(),
            retrieval_mode: mode,
            success: false,
            timed_out: false,
            skipped: true,
            facts: 0,
            events: 0,
            chunks: 0,
            nuggets: 0,
            has_profile: false,
            summary: None,
        }
    }

    fn timed_out(mode: RetrievalMode) -> Self {
        Self { timed_out: true, ..Self::skipped(mode) }.not_skipped()
    }

    fn failed(mode: RetrievalMode, summary: impl Into<String>) -> Self {
        Self { summary: Some(summary.into()), ..Self::skipped(mode) }.not_skipped()
    }

    fn not_skipped(mut self) -> Self {
        self.skipped = false;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryContextResult {
    pub pack_text: String,
    pub onboarding_needed: bool,
    pub error: Option<String>,
    pub provenance: MemoryProvenance,
}

impl MemoryContextResult {
    fn empty(provenance: MemoryProvenance, onboarding_needed: bool) -> Self {
        Self { pack_text: String::new(), onboarding_needed, error: None, provenance }
    }
}

/// Parameters for one `get_context` call.
pub struct MemoryContextRequest<'a> {
    pub user_message: &'a str,
    pub memory_enabled: bool,
    pub is_cold_greeting: bool,
    pub active_profile_id: Option<&'a str>,
    pub timeout: Duration,
}

/// The raw JSON shape the `memory_retrieve` tool is expected to return.
#[derive(Debug, Deserialize)]
struct MemoryRetrievePayload {
    #[serde(default)]
    pack_text: String,
    #[serde(default)]
    facts: u32,
    #[serde(default)]
    events: u32,
    #[serde(default)]
    chunks: u32,
    #[serde(default)]
    nuggets: u32,
    #[serde(default)]
    has_profile: bool,
}

/// Pre-fetches the memory pack for the current turn. `memory_enabled = false`
/// returns a `Skipped` provenance synchronously without touching the tool
/// client at all.
#[tracing::instrument(skip(client, sink, req), fields(session_id, is_cold_greeting = req.is_cold_greeting))]
pub async fn get_context(
    client: &AuditedToolClient,
    sink: &Arc<dyn AuditSink>,
    session_id: &str,
    req: MemoryContextRequest<'_>,
) -> MemoryContextResult {
    let mode = if req.is_cold_greeting { RetrievalMode::Greet } else { RetrievalMode::Normal };

    if !req.memory_enabled {
        tracing::debug!("memory prefetch skipped: memory disabled");
        return MemoryContextResult::empty(MemoryProvenance::skipped(mode), false);
    }

    let args = serde_json::json!({
        "query": req.user_message,
        "active_profile_id": req.active_profile_id,
    })
    .to_string();

    let ctx = CallContext {
        session_id: session_id.to_string(),
        capability: Some(Capability::MemoryRead),
        cancel: Arc::new(AtomicBool::new(false)),
    };

    let call_future = client.call("memory_retrieve", &args, ctx);
    let raw = match tokio::time::timeout(req.timeout, call_future).await {
        Ok(raw) => raw,
        Err(_) => {
            tracing::warn!(timeout_ms = req.timeout.as_millis() as u64, "memory prefetch timed out");
            return MemoryContextResult::empty(MemoryProvenance::timed_out(mode), false);
        }
    };

    let payload: MemoryRetrievePayload = match serde_json::from_str(&raw) {
        Ok(payload) => payload,
        Err(err) => {
            return MemoryContextResult {
                pack_text: String::new(),
                onboarding_needed: false,
                error: Some(err.to_string()),
                provenance: MemoryProvenance::failed(mode, err.to_string()),
            };
        }
    };

    let onboarding_needed = req.is_cold_greeting && !payload.has_profile;

    if !payload.pack_text.trim().is_empty() {
        sink.append(
            AuditEvent::new(session_id, actions::MEMORY_RETRIEVED, "memory_retrieve", AuditResult::Ok)
                .with_detail("facts", payload.facts)
                .with_detail("events", payload.events)
                .with_detail("chunks", payload.chunks)
                .with_detail("nuggets", payload.nuggets)
                .with_detail("has_profile", payload.has_profile),
        )
        .await;
    }

    MemoryContextResult {
        pack_text: payload.pack_text,
        onboarding_needed,
        error: None,
        provenance: MemoryProvenance {
            source_tool: "memory_retrieve".to_string(),
            retrieval_mode: mode,
            success: true,
            timed_out: false,
            skipped: false,
            facts: payload.facts,
            events: payload.events,
            chunks: payload.chunks,
            nuggets: payload.nuggets,
            has_profile: payload.has_profile,
            summary: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditSink;
    use crate::permission::{ConfigPermissionGate, PermissionSetting};
    use crate::tool_client::ToolServer;
    use async_trait::async_trait;

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

    struct HangingServer;

    #[async_trait]
    impl ToolServer for HangingServer {
        async fn call(&self, _canonical_name: &str, _args_json: &str, _cancel: Arc<AtomicBool>) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
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
    async fn disabled_memory_skips_without_calling_the_tool_client() {
        let sink: Arc<dyn AuditSink> = Arc::new(InMemoryAuditSink::new());
        let c = client(ScriptedServer("should not be read".to_string()));
        let result = get_context(
            &c,
            &sink,
            "s1",
            MemoryContextRequest {
                user_message: "hi",
                memory_enabled: false,
                is_cold_greeting: false,
                active_profile_id: None,
                timeout: Duration::from_secs(1),
            },
        )
        .await;
        assert!(result.provenance.skipped);
        assert!(result.pack_text.is_empty());
    }

    #[tokio::test]
    async fn successful_retrieval_parses_counts_and_emits_audit_event() {
        let concrete_sink = Arc::new(InMemoryAuditSink::new());
        let sink: Arc<dyn AuditSink> = concrete_sink.clone();
        let payload = serde_json::json!({
            "pack_text": "User likes Rust.",
            "facts": 2,
            "events": 0,
            "chunks": 1,
            "nuggets": 0,
            "has_profile": true,
        })
        .to_string();
        let c = client(ScriptedServer(payload));
        let result = get_context(
            &c,
            &sink,
            "s1",
            MemoryContextRequest {
                user_message: "what do you know about me?",
                memory_enabled: true,
                is_cold_greeting: false,
                active_profile_id: Some("p1"),
                timeout: Duration::from_secs(1),
            },
        )
        .await;
        assert!(result.provenance.success);
        assert_eq!(result.provenance.facts, 2);
        assert_eq!(result.pack_text, "User likes Rust.");

        let events = concrete_sink.events();
        assert!(events.iter().any(|e| e.action == actions::MEMORY_RETRIEVED));
    }

    #[tokio::test]
    async fn timeout_yields_timed_out_provenance() {
        let sink: Arc<dyn AuditSink> = Arc::new(InMemoryAuditSink::new());
        let c = client(HangingServer);
        let result = get_context(
            &c,
            &sink,
            "s1",
            MemoryContextRequest {
                user_message: "hi",
                memory_enabled: true,
                is_cold_greeting: true,
                active_profile_id: None,
                timeout: Duration::from_millis(20),
            },
        )
        .await;
        assert!(result.provenance.timed_out);
        assert!(!result.provenance.success);
    }

    #[tokio::test]
    async fn cold_greeting_without_profile_requests_onboarding() {
        let sink: Arc<dyn AuditSink> = Arc::new(InMemoryAuditSink::new());
        let payload = serde_json::json!({ "pack_text": "", "has_profile": false }).to_string();
        let c = client(ScriptedServer(payload));
        let result = get_context(
            &c,
            &sink,
            "s1",
            MemoryContextRequest {
                user_message: "hi",
                memory_enabled: true,
                is_cold_greeting: true,
                active_profile_id: None,
                timeout: Duration::from_secs(1),
            },
        )
        .await;
        assert!(result.onboarding_needed);
    }
}
