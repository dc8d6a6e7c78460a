use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of log entries returned when no limit is given.
pub const DEFAULT_LOG_WINDOW: usize = 50;

/// Largest log window a caller can ask for.
pub const MAX_LOG_WINDOW: usize = DEFAULT_LOG_WINDOW * 4;

/// An append-only message written by the worker.
///
/// The queue never writes or edits these; it only reads the most recent window
/// for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Input for appending a log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLogInput {
    pub level: LogLevel,
    pub message: String,
}
