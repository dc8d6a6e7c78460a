//! Legal status transitions and their side effects.
//!
//! Operator transitions:
//!
//! | From      | Action   | To        | Side effects                                  |
//! |-----------|----------|-----------|-----------------------------------------------|
//! | pending   | skip     | skipped   |                                               |
//! | pending   | complete | completed | `completed_at = now`                          |
//! | failed    | skip     | skipped   |                                               |
//! | failed    | retry    | pending   | clear `error_message`, `retry_count = 0`      |
//! | skipped   | requeue  | pending   |                                               |
//! | any but in_progress | delete | removed |                                      |
//!
//! Worker transitions move features into and out of `in_progress`. Everything
//! else is refused; the functions here return `None` and the caller reports a
//! precondition failure without writing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FeaturePatch, FeatureStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperatorAction {
    Skip,
    Retry,
    Complete,
    Requeue,
    Delete,
}

impl OperatorAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Retry => "retry",
            Self::Complete => "complete",
            Self::Requeue => "requeue",
            Self::Delete => "delete",
        }
    }
}

/// What an allowed operator transition does to the record.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Update(FeaturePatch),
    Remove,
}

/// Plan an operator transition from `status`, or `None` if it is not allowed.
pub fn operator_transition(
    action: OperatorAction,
    status: FeatureStatus,
    now: DateTime<Utc>,
) -> Option<Effect> {
    use FeatureStatus::*;

    let patch = match (action, status) {
        (OperatorAction::Delete, InProgress) => return None,
        (OperatorAction::Delete, _) => return Some(Effect::Remove),
        (OperatorAction::Skip, Pending | Failed) => FeaturePatch {
            status: Some(Skipped),
            ..FeaturePatch::default()
        },
        (OperatorAction::Complete, Pending) => FeaturePatch {
            status: Some(Completed),
            completed_at: Some(Some(now)),
            ..FeaturePatch::default()
        },
        (OperatorAction::Retry, Failed) => FeaturePatch {
            status: Some(Pending),
            error_message: Some(None),
            retry_count: Some(0),
            ..FeaturePatch::default()
        },
        (OperatorAction::Requeue, Skipped) => FeaturePatch {
            status: Some(Pending),
            ..FeaturePatch::default()
        },
        _ => return None,
    };
    Some(Effect::Update(patch))
}

/// Events reported by the external worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Claim,
    Succeed,
    Fail {
        message: String,
        skip_on_error: bool,
    },
}

impl WorkerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Succeed => "succeed",
            Self::Fail { .. } => "fail",
        }
    }

    /// The status the feature must be in for this event to apply.
    pub fn expected_status(&self) -> FeatureStatus {
        match self {
            Self::Claim => FeatureStatus::Pending,
            Self::Succeed | Self::Fail { .. } => FeatureStatus::InProgress,
        }
    }
}

/// Plan a worker transition, or `None` if `status` does not allow it.
pub fn worker_transition(
    event: &WorkerEvent,
    status: FeatureStatus,
    retry_count: u32,
    now: DateTime<Utc>,
) -> Option<FeaturePatch> {
    if status != event.expected_status() {
        return None;
    }

    let patch = match event {
        WorkerEvent::Claim => FeaturePatch {
            status: Some(FeatureStatus::InProgress),
            started_at: Some(Some(now)),
            completed_at: Some(None),
            ..FeaturePatch::default()
        },
        WorkerEvent::Succeed => FeaturePatch {
            status: Some(FeatureStatus::Completed),
            completed_at: Some(Some(now)),
            error_message: Some(None),
            ..FeaturePatch::default()
        },
        WorkerEvent::Fail {
            message,
            skip_on_error,
        } => FeaturePatch {
            status: Some(if *skip_on_error {
                FeatureStatus::Skipped
            } else {
                FeatureStatus::Failed
            }),
            error_message: Some(Some(message.clone())),
            retry_count: Some(retry_count.saturating_add(1)),
            ..FeaturePatch::default()
        },
    };
    Some(patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIONS: [OperatorAction; 4] = [
        OperatorAction::Skip,
        OperatorAction::Retry,
        OperatorAction::Complete,
        OperatorAction::Requeue,
    ];

    fn target(effect: Option<Effect>) -> Option<FeatureStatus> {
        match effect {
            Some(Effect::Update(patch)) => patch.status,
            _ => None,
        }
    }

    #[test]
    fn allowed_operator_transitions_match_the_table() {
        let now = Utc::now();
        let allowed = [
            (OperatorAction::Skip, FeatureStatus::Pending, FeatureStatus::Skipped),
            (OperatorAction::Complete, FeatureStatus::Pending, FeatureStatus::Completed),
            (OperatorAction::Skip, FeatureStatus::Failed, FeatureStatus::Skipped),
            (OperatorAction::Retry, FeatureStatus::Failed, FeatureStatus::Pending),
            (OperatorAction::Requeue, FeatureStatus::Skipped, FeatureStatus::Pending),
        ];

        for action in ACTIONS {
            for from in FeatureStatus::ALL {
                let expected = allowed
                    .iter()
                    .find(|(a, f, _)| *a == action && *f == from)
                    .map(|(_, _, to)| *to);
                assert_eq!(
                    target(operator_transition(action, from, now)),
                    expected,
                    "{} from {}",
                    action.as_str(),
                    from
                );
            }
        }
    }

    #[test]
    fn in_progress_and_completed_reject_every_operator_transition() {
        for action in ACTIONS {
            for from in [FeatureStatus::InProgress, FeatureStatus::Completed] {
                assert!(operator_transition(action, from, Utc::now()).is_none());
            }
        }
    }

    #[test]
    fn retry_clears_error_and_resets_count() {
        let Some(Effect::Update(patch)) =
            operator_transition(OperatorAction::Retry, FeatureStatus::Failed, Utc::now())
        else {
            panic!("retry from failed should be allowed");
        };
        assert_eq!(patch.error_message, Some(None));
        assert_eq!(patch.retry_count, Some(0));
    }

    #[test]
    fn complete_stamps_completed_at() {
        let now = Utc::now();
        let Some(Effect::Update(patch)) =
            operator_transition(OperatorAction::Complete, FeatureStatus::Pending, now)
        else {
            panic!("complete from pending should be allowed");
        };
        assert_eq!(patch.completed_at, Some(Some(now)));
    }

    #[test]
    fn delete_is_refused_only_while_in_progress() {
        for from in FeatureStatus::ALL {
            let effect = operator_transition(OperatorAction::Delete, from, Utc::now());
            if from == FeatureStatus::InProgress {
                assert!(effect.is_none());
            } else {
                assert_eq!(effect, Some(Effect::Remove));
            }
        }
    }

    #[test]
    fn claim_only_from_pending() {
        let now = Utc::now();
        for from in FeatureStatus::ALL {
            let patch = worker_transition(&WorkerEvent::Claim, from, 0, now);
            assert_eq!(patch.is_some(), from == FeatureStatus::Pending);
        }
        let patch = worker_transition(&WorkerEvent::Claim, FeatureStatus::Pending, 0, now).unwrap();
        assert_eq!(patch.started_at, Some(Some(now)));
    }

    #[test]
    fn failure_increments_retry_count_and_honours_skip_on_error() {
        let now = Utc::now();
        let fail = |skip_on_error| WorkerEvent::Fail {
            message: "boom".to_string(),
            skip_on_error,
        };

        let patch = worker_transition(&fail(false), FeatureStatus::InProgress, 2, now).unwrap();
        assert_eq!(patch.status, Some(FeatureStatus::Failed));
        assert_eq!(patch.retry_count, Some(3));
        assert_eq!(patch.error_message, Some(Some("boom".to_string())));

        let patch = worker_transition(&fail(true), FeatureStatus::InProgress, 0, now).unwrap();
        assert_eq!(patch.status, Some(FeatureStatus::Skipped));

        assert!(worker_transition(&fail(false), FeatureStatus::Pending, 0, now).is_none());
    }
}
