//! Append-only audit trail.

pub mod event;
pub mod jsonl;
pub mod sink;

pub use event::{actions, AuditEvent, AuditResult};
pub use jsonl::{default_audit_log_path, JsonlAuditSink};
pub use sink::AuditSink;

use async_trait::async_trait;
use std::sync::Mutex;

/// In-memory sink for tests, per spec.md §9's "allow a test double that
/// keeps events in memory".
#[derive(Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, event: AuditEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }

    async fn read_tail(&self, n: usize) -> Vec<AuditEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }
}
