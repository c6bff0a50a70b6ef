//! Deterministic, policy-gated turn-processing core for a local AI assistant.
//!
//! This crate owns the request-processing pipeline described in
//! `spec.md`: it receives a user turn and returns a final assistant turn,
//! orchestrating an LLM client, a tool server, a shallow memory store, and
//! an append-only audit log. The LLM transport, tool server, audit sink,
//! and memory backend are injected collaborators (traits); this crate
//! implements the router, policy gate, tool loop, search sub-pipeline,
//! guardrails coordinator, and the audited tool client wrapper around them.
//!
//! ```rust
//! use turn_core::prelude::*;
//! ```

pub mod audit;
pub mod capability;
pub mod config;
pub mod error;
pub mod guardrails;
pub mod llm;
pub mod logging;
pub mod memory;
pub mod model;
pub mod orchestrator;
pub mod permission;
pub mod policy_gate;
pub mod redaction;
pub mod router;
pub mod search;
pub mod tool_client;
pub mod tool_loop;
pub mod utility;

/// Convenience re-exports for the most commonly used traits and types.
pub mod prelude {
    pub use crate::audit::{AuditEvent, AuditResult, AuditSink};
    pub use crate::capability::{Capability, Intent, Policy, RouterOutput};
    pub use crate::config::AppConfig;
    pub use crate::error::CoreError;
    pub use crate::llm::LlmClient;
    pub use crate::memory::{get_context, MemoryContextRequest, MemoryContextResult};
    pub use crate::model::{ChatMessage, ChatRole, ToolCallRecord, ToolDefinition};
    pub use crate::orchestrator::{AgentResponse, Orchestrator, SessionState};
    pub use crate::permission::PermissionGate;
    pub use crate::tool_client::{AuditedToolClient, ToolServer};
}
