//! The permission gate the Audited Tool Client consults before every call.
//!
//! Grounded on the teacher's `security::policy::SecurityPolicy` —
//! `AutonomyLevel` + per-call `ValidationResult` — but reshaped around
//! spec.md §6's config model: six named tool-groups, each independently
//! `{off, ask, always}`, a `DeveloperOverride` that only ever loosens the
//! four "dangerous" groups, and a `Memory.Enabled` master switch that wins
//! over everything for the two memory groups.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capability::Capability;

/// The six independently configurable tool groups from spec.md §6. This is
/// a narrower, permission-focused partition than [`Capability`] —
/// `DeterministicUtility` and `Meta` never go through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolGroup {
    Screen,
    Files,
    System,
    Web,
    MemoryRead,
    MemoryWrite,
}

impl ToolGroup {
    /// Maps a capability to the permission group that gates it. Returns
    /// `None` for capabilities that are never permission-gated.
    pub fn for_capability(cap: Capability) -> Option<ToolGroup> {
        match cap {
            Capability::ScreenObserve => Some(ToolGroup::Screen),
            Capability::FileAccess => Some(ToolGroup::Files),
            Capability::SystemExecute => Some(ToolGroup::System),
            Capability::WebSearch | Capability::BrowserControl => Some(ToolGroup::Web),
            Capability::MemoryRead => Some(ToolGroup::MemoryRead),
            Capability::MemoryWrite => Some(ToolGroup::MemoryWrite),
            Capability::DeterministicUtility | Capability::Meta => None,
        }
    }

    /// The four groups a `DeveloperOverride` is allowed to touch.
    fn is_dangerous(self) -> bool {
        matches!(self, ToolGroup::Screen | ToolGroup::Files | ToolGroup::System | ToolGroup::Web)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionSetting {
    Off,
    Ask,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeveloperOverride {
    None,
    Off,
    Always,
}

/// The decision a permission gate returns for one call. `Prompt` means the
/// caller (the Audited Tool Client) must go ask — see
/// [`crate::tool_client::Approver`].
#[derive(Debug, Clone, PartialEq)]
pub enum PermissionDecision {
    Grant { token_id: Option<String> },
    Deny(String),
    Prompt,
}

#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn check(&self, group: Option<ToolGroup>, canonical_name: &str) -> PermissionDecision;
}

/// Config-driven permission gate. Holds only the slice of `AppConfig` it
/// needs, so tests can build one without the rest of the configuration
/// schema.
#[derive(Debug, Clone)]
pub struct ConfigPermissionGate {
    pub memory_enabled: bool,
    pub developer_override: DeveloperOverride,
    pub groups: std::collections::HashMap<ToolGroup, PermissionSetting>,
    /// Default for a tool group with no explicit entry. spec.md §6: "ask"
    /// in debug, "off" in release.
    pub default_setting: PermissionSetting,
}

impl ConfigPermissionGate {
    pub fn new(default_setting: PermissionSetting) -> Self {
        Self {
            memory_enabled: true,
            developer_override: DeveloperOverride::None,
            groups: std::collections::HashMap::new(),
            default_setting,
        }
    }

    pub fn with_group(mut self, group: ToolGroup, setting: PermissionSetting) -> Self {
        self.groups.insert(group, setting);
        self
    }

    fn effective_setting(&self, group: ToolGroup) -> PermissionSetting {
        if matches!(group, ToolGroup::MemoryRead | ToolGroup::MemoryWrite) && !self.memory_enabled {
            return PermissionSetting::Off;
        }
        if group.is_dangerous() {
            match self.developer_override {
                DeveloperOverride::Always => return PermissionSetting::Always,
                DeveloperOverride::Off => return PermissionSetting::Off,
                DeveloperOverride::None => {}
            }
        }
        self.groups.get(&group).copied().unwrap_or(self.default_setting)
    }
}

#[async_trait]
impl PermissionGate for ConfigPermissionGate {
    async fn check(&self, group: Option<ToolGroup>, _canonical_name: &str) -> PermissionDecision {
        let Some(group) = group else {
            // Never permission-gated (DeterministicUtility / Meta callers).
            return PermissionDecision::Grant { token_id: None };
        };
        match self.effective_setting(group) {
            PermissionSetting::Always => PermissionDecision::Grant { token_id: None },
            PermissionSetting::Off => PermissionDecision::Deny(format!("{group:?} is disabled")),
            PermissionSetting::Ask => PermissionDecision::Prompt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_master_off_wins_over_group_setting() {
        let mut gate = ConfigPermissionGate::new(PermissionSetting::Off);
        gate.memory_enabled = false;
        gate = gate.with_group(ToolGroup::MemoryRead, PermissionSetting::Always);
        assert_eq!(
            gate.check(Some(ToolGroup::MemoryRead), "memory_retrieve").await,
            PermissionDecision::Deny("MemoryRead is disabled".to_string())
        );
    }

    #[tokio::test]
    async fn developer_override_never_touches_memory_groups() {
        let mut gate = ConfigPermissionGate::new(PermissionSetting::Off);
        gate.developer_override = DeveloperOverride::Always;
        gate = gate.with_group(ToolGroup::MemoryWrite, PermissionSetting::Off);
        assert_eq!(
            gate.check(Some(ToolGroup::MemoryWrite), "memory_store_facts").await,
            PermissionDecision::Deny("MemoryWrite is disabled".to_string())
        );
    }

    #[tokio::test]
    async fn developer_override_always_grants_dangerous_groups() {
        let mut gate = ConfigPermissionGate::new(PermissionSetting::Off);
        gate.developer_override = DeveloperOverride::Always;
        assert_eq!(
            gate.check(Some(ToolGroup::Files), "file_read").await,
            PermissionDecision::Grant { token_id: None }
        );
    }

    #[tokio::test]
    async fn ask_setting_prompts() {
        let gate = ConfigPermissionGate::new(PermissionSetting::Off).with_group(ToolGroup::Web, PermissionSetting::Ask);
        assert_eq!(gate.check(Some(ToolGroup::Web), "web_search").await, PermissionDecision::Prompt);
    }

    #[tokio::test]
    async fn ungated_capability_always_grants() {
        let gate = ConfigPermissionGate::new(PermissionSetting::Off);
        assert_eq!(gate.check(None, "convert_temperature").await, PermissionDecision::Grant { token_id: None });
    }

    #[test]
    fn capability_to_group_mapping() {
        assert_eq!(ToolGroup::for_capability(Capability::ScreenObserve), Some(ToolGroup::Screen));
        assert_eq!(ToolGroup::for_capability(Capability::WebSearch), Some(ToolGroup::Web));
        assert_eq!(ToolGroup::for_capability(Capability::BrowserControl), Some(ToolGroup::Web));
        assert_eq!(ToolGroup::for_capability(Capability::DeterministicUtility), None);
        assert_eq!(ToolGroup::for_capability(Capability::Meta), None);
    }
}
