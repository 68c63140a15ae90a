//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::HookResult;

/// Inbox gate defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboxConfig {
    /// How long a gate waits before asking the driver to retry
    #[serde(with = "humantime_serde")]
    pub gate_timeout: Duration,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            gate_timeout: Duration::from_secs(30),
        }
    }
}

/// Defaults applied by the lifecycle-phase wrappers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HookDefaults {
    /// Priority given to hooks registered without an explicit one
    pub default_priority: i32,
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub inbox: InboxConfig,
    pub hooks: HookDefaults,
}

impl EngineConfig {
    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> HookResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> HookResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn with_gate_timeout(mut self, timeout: Duration) -> Self {
        self.inbox.gate_timeout = timeout;
        self
    }

    pub fn with_default_priority(mut self, priority: i32) -> Self {
        self.hooks.default_priority = priority;
        self
    }
}
