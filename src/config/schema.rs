//! TOML configuration schema for the turn-processing core.
//!
//! All fields have `#[serde(default)]` so a partially-filled `config.toml`
//! works correctly. Missing sections fall back to their `Default` impl.
//!
//! Example `~/.turn-core/config.toml`:
//! ```toml
//! [provider]
//! default_id = "openai"
//! default_model = "gpt-4o-mini"
//!
//! [permissions]
//! screen = "ask"
//! files = "ask"
//! system = "off"
//! web = "ask"
//! memory_read = "always"
//! memory_write = "ask"
//! developer_override = "none"
//!
//! [memory]
//! enabled = true
//!
//! [guardrails]
//! mode = "auto"
//! ```

use serde::{Deserialize, Serialize};

use crate::guardrails::GuardrailsMode;
use crate::permission::{ConfigPermissionGate, DeveloperOverride, PermissionSetting, ToolGroup};

// ─── ProviderConfig ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// ID of the default LLM provider (e.g. `"openai"`, `"anthropic"`).
    pub default_id: String,
    /// Default model identifier (e.g. `"gpt-4o-mini"`, `"claude-3-haiku"`).
    pub default_model: String,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum retry attempts on transient errors.
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default_id: "openai".to_owned(),
            default_model: "gpt-4o-mini".to_owned(),
            request_timeout_secs: 60,
            max_retries: 3,
        }
    }
}

// ─── PermissionsConfig ────────────────────────────────────────────────────────

/// Per-group permission settings for the six tool groups the Policy Gate and
/// Audited Tool Client consult. The default setting is `ask` in debug builds
/// and `off` in release builds, so a fresh install never silently grants
/// dangerous tool groups.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PermissionsConfig {
    pub screen: PermissionSetting,
    pub files: PermissionSetting,
    pub system: PermissionSetting,
    pub web: PermissionSetting,
    pub memory_read: PermissionSetting,
    pub memory_write: PermissionSetting,
    pub developer_override: DeveloperOverride,
}

fn default_group_setting() -> PermissionSetting {
    if cfg!(debug_assertions) {
        PermissionSetting::Ask
    } else {
        PermissionSetting::Off
    }
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        let setting = default_group_setting();
        Self {
            screen: setting,
            files: setting,
            system: setting,
            web: setting,
            memory_read: setting,
            memory_write: setting,
            developer_override: DeveloperOverride::None,
        }
    }
}

impl PermissionsConfig {
    /// Builds the runtime permission gate this config describes. `memory_enabled`
    /// comes from [`MemoryConfig`] rather than this struct, since it is a
    /// cross-cutting master switch rather than a per-group setting.
    pub fn to_gate(&self, memory_enabled: bool) -> ConfigPermissionGate {
        let mut gate = ConfigPermissionGate::new(default_group_setting());
        gate.memory_enabled = memory_enabled;
        gate.developer_override = self.developer_override;
        gate = gate
            .with_group(ToolGroup::Screen, self.screen)
            .with_group(ToolGroup::Files, self.files)
            .with_group(ToolGroup::System, self.system)
            .with_group(ToolGroup::Web, self.web)
            .with_group(ToolGroup::MemoryRead, self.memory_read)
            .with_group(ToolGroup::MemoryWrite, self.memory_write);
        gate
    }
}

// ─── MemoryConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Master switch for the Memory Context Provider. `false` disables both
    /// retrieval and storage regardless of the `memory_read`/`memory_write`
    /// group settings.
    pub enabled: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ─── GuardrailsConfig ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct GuardrailsConfig {
    pub mode: GuardrailsMode,
}

// ─── AppConfig ────────────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// Loaded from `~/.turn-core/config.toml`, falling back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub permissions: PermissionsConfig,
    pub memory: MemoryConfig,
    pub guardrails: GuardrailsConfig,
}
