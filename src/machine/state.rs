//! Machine state types.
//!
//! Providers report a [`ProviderStatus`]; callers of the driver see a
//! [`LifecycleState`]. The two are kept apart and joined by one exhaustive
//! conversion.

use serde::{Deserialize, Serialize};

/// Status as reported by a VM provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    /// VM process is up.
    Running,
    /// VM is not running.
    Stopped,
    /// Start is in progress.
    Starting,
    /// Anything the provider cannot classify, including values written by a
    /// newer provider.
    #[serde(other)]
    Unknown,
}

impl ProviderStatus {
    /// Parse a status name; unrecognized names become `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "running" => ProviderStatus::Running,
            "stopped" => ProviderStatus::Stopped,
            "starting" => ProviderStatus::Starting,
            _ => ProviderStatus::Unknown,
        }
    }
}

/// Lifecycle state reported to callers of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Not running.
    Stopped,
    /// Booting; not yet observed as running.
    Starting,
    /// Running.
    Running,
    /// State could not be determined.
    Error,
}

impl LifecycleState {
    /// Running or on its way there.
    pub fn is_running(&self) -> bool {
        matches!(self, LifecycleState::Running | LifecycleState::Starting)
    }

    /// Get the state name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Error => "error",
        }
    }
}

impl From<ProviderStatus> for LifecycleState {
    fn from(status: ProviderStatus) -> Self {
        match status {
            ProviderStatus::Running => LifecycleState::Running,
            ProviderStatus::Starting => LifecycleState::Starting,
            ProviderStatus::Stopped => LifecycleState::Stopped,
            ProviderStatus::Unknown => LifecycleState::Error,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
