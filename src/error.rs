//! Error taxonomy for queue operations.
//!
//! Every variant leaves the store untouched except `Store`, which reports that the
//! store call itself failed and nothing should be assumed about its outcome.

use thiserror::Error;
use uuid::Uuid;

use crate::models::FeatureStatus;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Input rejected before any store call.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The action is not legal for the feature's current status.
    #[error("Cannot {action} feature {id}: status is {status}")]
    Precondition {
        id: Uuid,
        action: &'static str,
        status: FeatureStatus,
    },

    #[error("Feature {0} not found")]
    NotFound(Uuid),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl QueueError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type QueueResult<T> = std::result::Result<T, QueueError>;
