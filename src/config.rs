//! Process settings loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_URL: &str = "http://localhost:17020/api/v1";
pub const DEFAULT_PORT: u16 = 17020;
pub const DEFAULT_POLL_SECS: u64 = 3;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Database file (from FEATURE_QUEUE_DB). `None` means the platform default.
    pub database_path: Option<PathBuf>,
    /// API base URL for the CLI and observer (from FEATURE_QUEUE_URL)
    pub api_url: String,
    /// Observer poll interval (from FEATURE_QUEUE_POLL_SECS, whole seconds)
    pub poll_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            api_url: DEFAULT_URL.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
        }
    }
}

impl Settings {
    /// Load settings from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    ///
    /// Empty values count as unset. An unparseable or zero poll interval falls
    /// back to the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_path = var("FEATURE_QUEUE_DB").map(PathBuf::from);

        let api_url = var("FEATURE_QUEUE_URL").unwrap_or_else(|| DEFAULT_URL.to_string());

        let poll_secs = match var("FEATURE_QUEUE_POLL_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    tracing::warn!(
                        "Ignoring FEATURE_QUEUE_POLL_SECS={:?}, using {}s",
                        raw,
                        DEFAULT_POLL_SECS
                    );
                    DEFAULT_POLL_SECS
                }
            },
            None => DEFAULT_POLL_SECS,
        };

        Self {
            database_path,
            api_url,
            poll_interval: Duration::from_secs(poll_secs),
        }
    }
}
