//! The Policy Gate: a pure function `(RouterOutput, available_tools) →
//! Policy`, plus the `ToolCapabilityRegistry` and `filter_tools` that turn a
//! `Policy` into the exposed tool set the LLM actually sees.
//!
//! Unknown (unmapped) tool names are hidden by default — the registry's
//! default table only recognizes tools whose canonical name it was built
//! to know about.

use std::collections::HashSet;

use crate::capability::{Capability, Intent, Policy, RouterOutput};
use crate::model::ToolDefinition;

/// Canonical tool name → `Capability`. Built with a fixed default table;
/// callers can extend it for locally registered tools.
#[derive(Debug, Clone, Default)]
pub struct ToolCapabilityRegistry {
    table: std::collections::HashMap<String, Capability>,
}

impl ToolCapabilityRegistry {
    pub fn new() -> Self {
        Self::default().with_defaults()
    }

    fn with_defaults(mut self) -> Self {
        use Capability::*;
        let defaults: &[(&str, Capability)] = &[
            ("web_search", WebSearch),
            ("browser_navigate", BrowserControl),
            ("browser_click", BrowserControl),
            ("screen_capture", ScreenObserve),
            ("get_active_window", ScreenObserve),
            ("file_read", FileAccess),
            ("file_write", FileAccess),
            ("system_exec", SystemExecute),
            ("memory_retrieve", MemoryRead),
            ("memory_list_facts", MemoryRead),
            ("memory_store_facts", MemoryWrite),
            ("resolve_timezone", DeterministicUtility),
            ("holidays_is_today", DeterministicUtility),
            ("feed_fetch", DeterministicUtility),
            ("status_check_url", DeterministicUtility),
            ("weather_geocode", DeterministicUtility),
        ];
        for (name, cap) in defaults {
            self.table.insert((*name).to_string(), *cap);
        }
        self
    }

    pub fn insert(&mut self, canonical_name: impl Into<String>, capability: Capability) {
        self.table.insert(canonical_name.into(), capability);
    }

    /// Returns `None` for any tool name the registry doesn't know about —
    /// that is what makes such tools hidden by default.
    pub fn capability_for(&self, canonical_name: &str) -> Option<Capability> {
        self.table.get(canonical_name).copied()
    }
}

/// Builds the `Policy` for a routed turn per the fixed intent table. The
/// `conditional` predicates from the data model (follow-up browsing,
/// `needs_web` for the general fallback) are evaluated inline here rather
/// than stored as closures on `Policy`.
pub fn policy_for(router_output: &RouterOutput, has_recent_search_session: bool) -> Policy {
    use Capability::*;
    match router_output.intent {
        Intent::ChatOnly | Intent::UtilityDeterministic => Policy::none(),
        Intent::MemoryRead => Policy::none(),
        Intent::LookupFact | Intent::LookupNews | Intent::LookupSearch => {
            let mut caps = vec![WebSearch];
            if has_recent_search_session {
                caps.push(BrowserControl);
            }
            Policy::tool_loop(caps)
        }
        Intent::BrowseOnce => Policy::tool_loop([BrowserControl]),
        Intent::OneShotDiscovery => Policy::tool_loop([WebSearch, BrowserControl]),
        Intent::ScreenObserve => Policy::tool_loop([ScreenObserve]),
        Intent::FileTask => Policy::tool_loop([FileAccess]),
        Intent::SystemTask => Policy::tool_loop([SystemExecute]),
        Intent::MemoryWrite => Policy::tool_loop([MemoryWrite]),
        Intent::GeneralTool => {
            let mut caps = vec![Meta];
            if router_output.needs_web {
                caps.push(WebSearch);
            }
            Policy::tool_loop(caps)
        }
    }
}

/// Keeps exactly the tools whose canonical name maps, via `registry`, to an
/// allowed capability under `policy`. A tool that maps to a forbidden
/// capability is dropped even if it would otherwise be allowed; a tool the
/// registry doesn't recognize is dropped unconditionally.
pub fn filter_tools(available: &[ToolDefinition], policy: &Policy, registry: &ToolCapabilityRegistry) -> Vec<ToolDefinition> {
    if !policy.use_tool_loop {
        return Vec::new();
    }
    available
        .iter()
        .filter(|tool| {
            let Some(capability) = registry.capability_for(&tool.name) else {
                return false;
            };
            if policy.forbidden_capabilities.contains(&capability) {
                return false;
            }
            policy.allowed_capabilities.contains(&capability)
        })
        .cloned()
        .collect()
}

/// Convenience: the set of capabilities exposed by a filtered tool list,
/// for asserting the "policy containment" property in tests.
pub fn exposed_capabilities(tools: &[ToolDefinition], registry: &ToolCapabilityRegistry) -> HashSet<Capability> {
    tools.iter().filter_map(|t| registry.capability_for(&t.name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::RouterLayer;

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition { name: name.to_string(), description: String::new(), parameters_schema: serde_json::json!({}) }
    }

    #[test]
    fn chat_only_exposes_no_tools() {
        let router_output = RouterOutput::new(Intent::ChatOnly, RouterLayer::Heuristic, false, false);
        let policy = policy_for(&router_output, false);
        assert!(!policy.use_tool_loop);
        assert!(policy.allowed_capabilities.is_empty());
    }

    #[test]
    fn lookup_search_exposes_web_search_only_without_a_recent_session() {
        let router_output = RouterOutput::new(Intent::LookupSearch, RouterLayer::Heuristic, true, true);
        let policy = policy_for(&router_output, false);
        assert!(policy.allowed_capabilities.contains(&Capability::WebSearch));
        assert!(!policy.allowed_capabilities.contains(&Capability::BrowserControl));
    }

    #[test]
    fn lookup_search_adds_browser_control_for_a_follow_up() {
        let router_output = RouterOutput::new(Intent::LookupSearch, RouterLayer::Heuristic, true, true);
        let policy = policy_for(&router_output, true);
        assert!(policy.allowed_capabilities.contains(&Capability::BrowserControl));
    }

    #[test]
    fn unknown_tool_names_are_hidden_by_default() {
        let registry = ToolCapabilityRegistry::new();
        let router_output = RouterOutput::new(Intent::LookupSearch, RouterLayer::Heuristic, true, true);
        let policy = policy_for(&router_output, false);
        let available = vec![tool("web_search"), tool("some_custom_plugin_tool")];
        let exposed = filter_tools(&available, &policy, &registry);
        assert_eq!(exposed.len(), 1);
        assert_eq!(exposed[0].name, "web_search");
    }

    #[test]
    fn forbidden_capability_is_never_exposed_even_if_allowed_would_match() {
        let registry = ToolCapabilityRegistry::new();
        let mut policy = Policy::tool_loop([Capability::WebSearch]);
        policy.forbidden_capabilities.insert(Capability::WebSearch);
        let available = vec![tool("web_search")];
        assert!(filter_tools(&available, &policy, &registry).is_empty());
    }

    #[test]
    fn system_task_exposes_a_single_tool() {
        let registry = ToolCapabilityRegistry::new();
        let router_output = RouterOutput::new(Intent::SystemTask, RouterLayer::Heuristic, false, false);
        let policy = policy_for(&router_output, false);
        let available = vec![tool("system_exec"), tool("file_read")];
        let exposed = filter_tools(&available, &policy, &registry);
        assert_eq!(exposed.len(), 1);
        assert_eq!(exposed[0].name, "system_exec");
    }
}
