use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category assigned when a feature is created without one.
pub const DEFAULT_CATEGORY: &str = "general";

/// A discrete unit of backlog work.
///
/// The text fields (`name`, `description`, `category`, `instructions`) are never
/// changed by queue operations; only status, priority and the bookkeeping fields
/// that belong to each transition are mutated in place.
///
/// # Lifecycle
/// Features are created `pending` and are claimed by the external worker
/// (`in_progress`), which reports them `completed` or `failed`. The operator can
/// skip, retry, complete, re-queue or delete them. See [`crate::queue::lifecycle`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Free-text payload for the worker. Opaque to the queue.
    pub instructions: Option<String>,
    /// Sort key, ascending. Not unique, not contiguous.
    pub priority: f64,
    pub status: FeatureStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Feature {
    /// Build a fresh `pending` feature from validated input.
    pub fn new(input: NewFeature, priority: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            category: input.category,
            instructions: input.instructions,
            priority,
            status: FeatureStatus::Pending,
            started_at: None,
            completed_at: None,
            error_message: None,
            retry_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// The lifecycle status of a feature.
///
/// - `Pending`: Waiting in the backlog
/// - `InProgress`: Claimed by the worker (at most one, by convention)
/// - `Completed`: Built successfully
/// - `Failed`: The worker gave up; `error_message` says why
/// - `Skipped`: Set aside by the operator or by the skip-on-error policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl FeatureStatus {
    pub const ALL: [FeatureStatus; 5] = [
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Failed,
        Self::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A partial update to a feature record.
///
/// Double options distinguish "leave alone" (`None`) from "clear"
/// (`Some(None)`) for nullable columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeaturePatch {
    pub status: Option<FeatureStatus>,
    pub priority: Option<f64>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub error_message: Option<Option<String>>,
    pub retry_count: Option<u32>,
}

impl FeaturePatch {
    pub fn priority(priority: f64) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch to an in-memory copy of a feature.
    pub fn apply_to(&self, feature: &mut Feature) {
        if let Some(status) = self.status {
            feature.status = status;
        }
        if let Some(priority) = self.priority {
            feature.priority = priority;
        }
        if let Some(started_at) = self.started_at {
            feature.started_at = started_at;
        }
        if let Some(completed_at) = self.completed_at {
            feature.completed_at = completed_at;
        }
        if let Some(ref error_message) = self.error_message {
            feature.error_message = error_message.clone();
        }
        if let Some(retry_count) = self.retry_count {
            feature.retry_count = retry_count;
        }
    }
}

/// Where a newly inserted feature lands in the backlog.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// After every pending feature.
    #[default]
    Back,
    /// Ahead of every pending feature ("start now").
    Front,
}

/// Input for creating a new feature through the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFeatureInput {
    pub name: String,
    /// Defaults to the name if not specified.
    pub description: Option<String>,
    /// Defaults to [`DEFAULT_CATEGORY`] if not specified.
    pub category: Option<String>,
    pub instructions: Option<String>,
    #[serde(default)]
    pub placement: Placement,
}

/// A validated feature definition, ready to be given a priority and inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeature {
    pub name: String,
    pub description: String,
    pub category: String,
    pub instructions: Option<String>,
}

/// Input for the worker reporting a failed build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailFeatureInput {
    pub error_message: String,
}
