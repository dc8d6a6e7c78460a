use serde::{Deserialize, Serialize};

/// Config table keys for the engine flags.
pub mod keys {
    pub const ENGINE_PAUSED: &str = "engine_paused";
    pub const AUTO_APPROVE: &str = "auto_approve";
    pub const SKIP_ON_ERROR: &str = "skip_on_error";
    pub const NOTIFICATION_EMAIL: &str = "notification_email";
}

/// Process-wide flags shared by the operator and the worker.
///
/// Each field is stored under its own key, so a load may see a mix of fresh and
/// missing keys. Missing keys take the [`Default`] value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// The worker stops claiming new features while set.
    pub engine_paused: bool,
    /// Policy flag for the worker. Stored and displayed only.
    pub auto_approve: bool,
    /// When set, a failed build lands in `skipped` instead of `failed`.
    pub skip_on_error: bool,
    pub notification_email: String,
}

/// Input for updating engine flags. Only the fields present are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateConfigInput {
    pub engine_paused: Option<bool>,
    pub auto_approve: Option<bool>,
    pub skip_on_error: Option<bool>,
    pub notification_email: Option<String>,
}

/// Display status of the engine, derived from the pause flag and whether
/// anything is currently being built.
///
/// - `Running`: Not paused, or paused but still finishing (see `Pausing`)
/// - `Pausing`: Pause requested, the worker still holds a feature
/// - `Paused`: Pause requested and nothing in progress
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Running,
    Pausing,
    Paused,
}

impl EngineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Pausing => "pausing",
            Self::Paused => "paused",
        }
    }
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
