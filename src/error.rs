//! Per-subsystem error taxonomy.
//!
//! Each collaborator gets its own `thiserror`-derived enum, mirroring the
//! teacher's `skills::error::SkillError` shape: one variant per failure mode,
//! `#[from]` conversions at the boundaries that genuinely wrap another
//! subsystem's error. [`CoreError`] composes them for call sites that need a
//! single type, but the Orchestrator never surfaces it directly — every
//! unexpected failure is folded into the taxonomy described in spec §7
//! before a turn returns.

use thiserror::Error;

/// Failures from the Audited Tool Client.
#[derive(Debug, Error)]
pub enum ToolClientError {
    #[error("tool call blocked: {0}")]
    Blocked(String),
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// Failures from the permission gate.
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("permission denied: {0}")]
    Denied(String),
}

/// Failures from the Memory Context Provider.
#[derive(Debug, Error)]
pub enum MemoryContextError {
    #[error("memory retrieval timed out")]
    TimedOut,
    #[error("memory retrieval failed: {0}")]
    Failed(String),
}

/// Failures from the Router's LLM classification layer.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("llm classification failed: {0}")]
    ClassificationFailed(String),
}

/// Failures from the Search Orchestrator.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("entity resolution failed: {0}")]
    EntityResolutionFailed(String),
    #[error("query building failed: {0}")]
    QueryBuildFailed(String),
    #[error("web search failed: {0}")]
    WebSearchFailed(String),
}

/// Failures from the Tool Loop Executor.
#[derive(Debug, Error)]
pub enum ToolLoopError {
    #[error("budget exhausted after {0} rounds")]
    BudgetExhausted(u32),
    #[error("cancelled")]
    Cancelled,
}

/// Failures from the Guardrails Coordinator.
#[derive(Debug, Error)]
pub enum GuardrailsError {
    #[error("guardrails stage malformed: {0}")]
    Malformed(&'static str),
}

/// Failures from config loading. Loading itself is out of scope as a tested
/// component (spec.md §1 Non-goals), but the error type travels with the
/// schema so the Policy Gate / Audited Tool Client can report misconfiguration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Unified error type for call sites that need one. Individual components
/// keep returning their own narrower error enum; this exists for composing
/// across subsystem boundaries (e.g. the Orchestrator's internal plumbing).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    ToolClient(#[from] ToolClientError),
    #[error(transparent)]
    Permission(#[from] PermissionError),
    #[error(transparent)]
    MemoryContext(#[from] MemoryContextError),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    ToolLoop(#[from] ToolLoopError),
    #[error(transparent)]
    Guardrails(#[from] GuardrailsError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
