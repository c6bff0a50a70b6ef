//! Closed enums for capabilities and intents, plus the values the Router
//! and Policy Gate pass between each other.
//!
//! Tool exposure is keyed by these closed enums rather than open string
//! groups, and unknown (unmapped) tools are hidden by default — see
//! `policy_gate` for the table that enforces it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A category of action a tool performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    WebSearch,
    BrowserControl,
    ScreenObserve,
    FileAccess,
    SystemExecute,
    MemoryRead,
    MemoryWrite,
    DeterministicUtility,
    Meta,
}

impl Capability {
    pub const ALL: &'static [Capability] = &[
        Capability::WebSearch,
        Capability::BrowserControl,
        Capability::ScreenObserve,
        Capability::FileAccess,
        Capability::SystemExecute,
        Capability::MemoryRead,
        Capability::MemoryWrite,
        Capability::DeterministicUtility,
        Capability::Meta,
    ];
}

/// The Router's single-label classification of the user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ChatOnly,
    UtilityDeterministic,
    LookupFact,
    LookupNews,
    LookupSearch,
    BrowseOnce,
    OneShotDiscovery,
    ScreenObserve,
    FileTask,
    SystemTask,
    MemoryRead,
    MemoryWrite,
    GeneralTool,
}

impl Intent {
    /// True for the `lookup_*` family that the Search Orchestrator owns.
    pub fn is_search(self) -> bool {
        matches!(self, Intent::LookupFact | Intent::LookupNews | Intent::LookupSearch)
    }
}

/// The layer of the Router that produced a given output, used only to set
/// `confidence` (explicit/deterministic = 1.0, heuristic = 0.8, LLM = its
/// own reported number).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterLayer {
    ExplicitOverride,
    DeterministicUtility,
    Heuristic,
    LlmClassification,
}

/// Output of the Router: what the turn needs, and how sure the Router is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterOutput {
    pub intent: Intent,
    pub confidence: f32,
    pub needs_web: bool,
    pub needs_search: bool,
    pub required_capabilities: HashSet<Capability>,
}

impl RouterOutput {
    pub fn new(intent: Intent, layer: RouterLayer, needs_web: bool, needs_search: bool) -> Self {
        let confidence = match layer {
            RouterLayer::ExplicitOverride | RouterLayer::DeterministicUtility => 1.0,
            RouterLayer::Heuristic => 0.8,
            RouterLayer::LlmClassification => 0.0, // caller overrides with the model's own number
        };
        Self {
            intent,
            confidence,
            needs_web,
            needs_search,
            required_capabilities: capabilities_for_intent(intent),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Fixed table: the capabilities a given intent could legitimately need.
/// This is distinct from the Policy Gate's `allowed_capabilities` — it only
/// names what the downstream *could* need, not what gets exposed.
pub fn capabilities_for_intent(intent: Intent) -> HashSet<Capability> {
    use Capability::*;
    let set: &[Capability] = match intent {
        Intent::ChatOnly => &[],
        Intent::UtilityDeterministic => &[DeterministicUtility],
        Intent::LookupFact | Intent::LookupNews | Intent::LookupSearch => &[WebSearch, BrowserControl],
        Intent::BrowseOnce => &[BrowserControl],
        Intent::OneShotDiscovery => &[WebSearch, BrowserControl],
        Intent::ScreenObserve => &[ScreenObserve],
        Intent::FileTask => &[FileAccess],
        Intent::SystemTask => &[SystemExecute],
        Intent::MemoryRead => &[MemoryRead],
        Intent::MemoryWrite => &[MemoryWrite],
        Intent::GeneralTool => &[Meta, WebSearch],
    };
    set.iter().copied().collect()
}

/// The Policy Gate's per-intent decision about tool exposure.
#[derive(Debug, Clone)]
pub struct Policy {
    pub use_tool_loop: bool,
    pub allowed_capabilities: HashSet<Capability>,
    pub forbidden_capabilities: HashSet<Capability>,
    pub allow_wildcards: Vec<String>,
}

impl Policy {
    pub fn none() -> Self {
        Self {
            use_tool_loop: false,
            allowed_capabilities: HashSet::new(),
            forbidden_capabilities: HashSet::new(),
            allow_wildcards: Vec::new(),
        }
    }

    pub fn tool_loop(allowed: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            use_tool_loop: true,
            allowed_capabilities: allowed.into_iter().collect(),
            forbidden_capabilities: HashSet::new(),
            allow_wildcards: Vec::new(),
        }
    }
}
