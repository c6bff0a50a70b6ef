//! The audit sink abstraction. spec.md §9 ("Audit log as cross-cutting
//! concern") is explicit: treat it as an injected parameter, never a global,
//! and allow an in-memory test double. This mirrors how the teacher injects
//! `Arc<dyn EventBus>` into `AgentLoop` rather than reaching for a static.

use async_trait::async_trait;

use super::event::AuditEvent;

/// Where audit events go. Append-only; never mutates or removes a past
/// event. Concurrent appenders are permitted (spec.md §5) — ordering is by
/// completion time, not a caller-supplied sequence number.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, event: AuditEvent);

    /// Returns the last `n` valid events in append order, skipping any
    /// malformed lines a persisted implementation may encounter.
    async fn read_tail(&self, n: usize) -> Vec<AuditEvent>;
}
