//! JSON-Lines persisted audit sink.
//!
//! Grounded on the append-only `OpenOptions::new().append(true)` pattern the
//! teacher pack's session-transcript writer uses for its own JSONL log:
//! one `serde_json` object per line, opened in append mode, flushed per
//! write. `read_tail` re-reads the whole file and keeps the last `n` lines
//! that parse — malformed lines (a partial write, a manually edited file)
//! are skipped rather than aborting the read, per spec.md §6/§8.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncBufReadExt;

use super::event::AuditEvent;
use super::sink::AuditSink;

/// Returns the default audit log path under the platform-local application
/// data directory, per spec.md §6. Callers (outside this crate's scope) are
/// free to override it; this is only the documented default.
pub fn default_audit_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("turn-core")
        .join("audit.jsonl")
}

pub struct JsonlAuditSink {
    path: PathBuf,
    // A single `Mutex` serializes writes; concurrent appenders are allowed
    // by spec.md §5 but must not interleave partial lines.
    writer: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), writer: Mutex::new(()) }
    }

    fn append_sync(path: &Path, event: &AuditEvent) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
        writeln!(file, "{line}")
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn append(&self, event: AuditEvent) {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(err) = Self::append_sync(&self.path, &event) {
            tracing::warn!(error = %err, "failed to append audit event");
        }
    }

    async fn read_tail(&self, n: usize) -> Vec<AuditEvent> {
        let Ok(file) = tokio::fs::File::open(&self.path).await else {
            return Vec::new();
        };
        let mut lines = tokio::io::BufReader::new(file).lines();
        let mut ring: VecDeque<AuditEvent> = VecDeque::with_capacity(n);
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEvent>(&line) {
                Ok(event) => {
                    if ring.len() == n {
                        ring.pop_front();
                    }
                    ring.push_back(event);
                }
                Err(_) => continue, // skip malformed lines
            }
        }
        ring.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::event::AuditResult;

    #[tokio::test]
    async fn append_then_read_tail_round_trips_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("audit.jsonl"));
        for i in 0..5 {
            sink.append(AuditEvent::new("orchestrator", "TEST_EVENT", format!("t{i}"), AuditResult::Ok)).await;
        }
        let tail = sink.read_tail(3).await;
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].target, "t2");
        assert_eq!(tail[2].target, "t4");
    }

    #[tokio::test]
    async fn read_tail_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JsonlAuditSink::new(&path);
        sink.append(AuditEvent::new("orchestrator", "TEST_EVENT", "t0", AuditResult::Ok)).await;
        {
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "not json").unwrap();
        }
        sink.append(AuditEvent::new("orchestrator", "TEST_EVENT", "t1", AuditResult::Ok)).await;

        let tail = sink.read_tail(10).await;
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].target, "t0");
        assert_eq!(tail[1].target, "t1");
    }

    #[tokio::test]
    async fn read_tail_on_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("missing.jsonl"));
        assert!(sink.read_tail(5).await.is_empty());
    }
}
