use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{EngineConfig, EngineStatus, Feature, FeatureStatus, LogEntry};

/// Per-status feature counts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
}

impl StatusCounts {
    pub fn tally<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Self {
        let mut counts = Self::default();
        for feature in features {
            match feature.status {
                FeatureStatus::Pending => counts.pending += 1,
                FeatureStatus::InProgress => counts.in_progress += 1,
                FeatureStatus::Completed => counts.completed += 1,
                FeatureStatus::Failed => counts.failed += 1,
                FeatureStatus::Skipped => counts.skipped += 1,
            }
            counts.total += 1;
        }
        counts
    }

    pub fn get(&self, status: FeatureStatus) -> usize {
        match status {
            FeatureStatus::Pending => self.pending,
            FeatureStatus::InProgress => self.in_progress,
            FeatureStatus::Completed => self.completed,
            FeatureStatus::Failed => self.failed,
            FeatureStatus::Skipped => self.skipped,
        }
    }

    /// Fraction of features completed, `0.0` for an empty queue.
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Derived view over one read of the feature table.
///
/// Built fresh from every read and never mutated; a later read replaces it.
#[derive(Debug, Clone, Default)]
pub struct QueueView {
    /// Stored order. Priority ties fall back to this order.
    features: Vec<Feature>,
}

impl QueueView {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn get(&self, id: Uuid) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    /// All features by ascending priority. The sort is stable, so equal
    /// priorities keep their stored order.
    pub fn ordered(&self) -> Vec<&Feature> {
        let mut ordered: Vec<&Feature> = self.features.iter().collect();
        ordered.sort_by(|a, b| a.priority.total_cmp(&b.priority));
        ordered
    }

    /// Features with `status`, in queue order.
    pub fn with_status(&self, status: FeatureStatus) -> Vec<&Feature> {
        self.ordered()
            .into_iter()
            .filter(|f| f.status == status)
            .collect()
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts::tally(&self.features)
    }

    pub fn progress(&self) -> f64 {
        self.counts().progress()
    }

    /// The first `in_progress` feature in stored order.
    pub fn current(&self) -> Option<&Feature> {
        self.features
            .iter()
            .find(|f| f.status == FeatureStatus::InProgress)
    }

    /// Every `in_progress` feature, earliest `started_at` first.
    ///
    /// Normally zero or one. More than one means the worker broke the
    /// one-at-a-time convention, and callers get to see all of them.
    pub fn in_progress(&self) -> Vec<&Feature> {
        let mut building: Vec<&Feature> = self
            .features
            .iter()
            .filter(|f| f.status == FeatureStatus::InProgress)
            .collect();
        building.sort_by_key(|f| f.started_at);
        building
    }

    pub fn is_building(&self) -> bool {
        self.current().is_some()
    }

    /// The pending feature the worker should claim next.
    pub fn next_pending(&self) -> Option<&Feature> {
        self.with_status(FeatureStatus::Pending).into_iter().next()
    }

    pub fn pending_priorities(&self) -> impl Iterator<Item = f64> + '_ {
        self.features
            .iter()
            .filter(|f| f.status == FeatureStatus::Pending)
            .map(|f| f.priority)
    }
}

/// Everything an observer renders, assembled from one poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueSnapshot {
    /// All features in queue order.
    pub features: Vec<Feature>,
    pub counts: StatusCounts,
    pub current: Option<Feature>,
    pub in_progress: Vec<Feature>,
    pub progress: f64,
    pub config: EngineConfig,
    pub engine_status: EngineStatus,
    pub logs: Vec<LogEntry>,
}

impl QueueSnapshot {
    pub fn feature(&self, id: Uuid) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewFeature;

    fn feature(name: &str, priority: f64, status: FeatureStatus) -> Feature {
        let mut f = Feature::new(
            NewFeature {
                name: name.to_string(),
                description: name.to_string(),
                category: "general".to_string(),
                instructions: None,
            },
            priority,
        );
        f.status = status;
        f
    }

    fn names(features: &[&Feature]) -> Vec<String> {
        features.iter().map(|f| f.name.clone()).collect()
    }

    #[test]
    fn orders_by_priority_with_stored_order_tiebreak() {
        let view = QueueView::new(vec![
            feature("c", 3.0, FeatureStatus::Pending),
            feature("a1", 1.0, FeatureStatus::Pending),
            feature("b", 2.0, FeatureStatus::Completed),
            feature("a2", 1.0, FeatureStatus::Pending),
            feature("neg", -0.5, FeatureStatus::Pending),
        ]);

        assert_eq!(names(&view.ordered()), vec!["neg", "a1", "a2", "b", "c"]);
    }

    #[test]
    fn progress_is_zero_for_empty_queue() {
        let view = QueueView::new(vec![]);
        let progress = view.progress();
        assert_eq!(progress, 0.0);
        assert!(!progress.is_nan());
    }

    #[test]
    fn progress_is_completed_over_total() {
        for total in 1..6usize {
            for completed in 0..=total {
                let features = (0..total)
                    .map(|i| {
                        let status = if i < completed {
                            FeatureStatus::Completed
                        } else {
                            FeatureStatus::Pending
                        };
                        feature(&i.to_string(), i as f64, status)
                    })
                    .collect();
                let view = QueueView::new(features);
                assert_eq!(view.progress(), completed as f64 / total as f64);
            }
        }
    }

    #[test]
    fn counts_every_status() {
        let view = QueueView::new(vec![
            feature("p", 1.0, FeatureStatus::Pending),
            feature("i", 2.0, FeatureStatus::InProgress),
            feature("c1", 3.0, FeatureStatus::Completed),
            feature("c2", 4.0, FeatureStatus::Completed),
            feature("f", 5.0, FeatureStatus::Failed),
            feature("s", 6.0, FeatureStatus::Skipped),
        ]);

        let counts = view.counts();
        assert_eq!(counts.total, 6);
        assert_eq!(counts.completed, 2);
        for status in FeatureStatus::ALL {
            assert_eq!(counts.get(status), view.with_status(status).len());
        }
    }

    #[test]
    fn current_is_first_in_progress_in_stored_order() {
        let view = QueueView::new(vec![
            feature("p", 0.0, FeatureStatus::Pending),
            feature("late", 9.0, FeatureStatus::InProgress),
            feature("early", 1.0, FeatureStatus::InProgress),
        ]);

        assert_eq!(view.current().map(|f| f.name.as_str()), Some("late"));
        assert_eq!(view.in_progress().len(), 2);
        assert!(view.is_building());
    }

    #[test]
    fn next_pending_ignores_other_statuses() {
        let view = QueueView::new(vec![
            feature("failed", 0.0, FeatureStatus::Failed),
            feature("second", 2.0, FeatureStatus::Pending),
            feature("first", 1.0, FeatureStatus::Pending),
        ]);

        assert_eq!(view.next_pending().map(|f| f.name.as_str()), Some("first"));
    }
}
