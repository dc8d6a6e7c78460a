use chrono::Utc;
use uuid::Uuid;

use super::control;
use super::intake;
use super::lifecycle::{self, Effect, OperatorAction, WorkerEvent};
use super::priority;
use super::view::{QueueSnapshot, QueueView};
use crate::error::{QueueError, QueueResult};
use crate::models::*;
use crate::store::Store;

/// Queue operations over an injected [`Store`].
///
/// Holds no state besides the store handle. Every operation reads what it needs
/// from the store at call time and writes single records, filtered on the
/// status it validated, so a concurrent change between read and write shows up
/// as a precondition failure rather than a silent overwrite.
#[derive(Debug, Clone)]
pub struct FeatureQueue<S> {
    store: S,
}

impl<S: Store> FeatureQueue<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    // ============================================================
    // Reads
    // ============================================================

    pub fn view(&self) -> QueueResult<QueueView> {
        Ok(QueueView::new(self.store.select_features()?))
    }

    pub fn snapshot(&self, log_limit: usize) -> QueueResult<QueueSnapshot> {
        let view = self.view()?;
        let config = self.config()?;
        let logs = self.store.select_logs(log_limit.min(MAX_LOG_WINDOW))?;

        let counts = view.counts();
        Ok(QueueSnapshot {
            features: view.ordered().into_iter().cloned().collect(),
            counts,
            current: view.current().cloned(),
            in_progress: view.in_progress().into_iter().cloned().collect(),
            progress: counts.progress(),
            engine_status: control::engine_status(config.engine_paused, view.is_building()),
            config,
            logs,
        })
    }

    /// Features in queue order, optionally restricted to one status.
    pub fn list(&self, status: Option<FeatureStatus>) -> QueueResult<Vec<Feature>> {
        let view = self.view()?;
        let features = match status {
            Some(status) => view.with_status(status),
            None => view.ordered(),
        };
        Ok(features.into_iter().cloned().collect())
    }

    pub fn get(&self, id: Uuid) -> QueueResult<Feature> {
        self.store
            .get_feature(id)?
            .ok_or(QueueError::NotFound(id))
    }

    // ============================================================
    // Insertion
    // ============================================================

    pub fn create(&self, input: CreateFeatureInput) -> QueueResult<Feature> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(QueueError::validation("name must not be empty"));
        }
        let new = NewFeature {
            description: input
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| name.clone()),
            category: input
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            instructions: input.instructions,
            name,
        };
        self.insert(new, input.placement)
    }

    /// Insert a validated feature at the back of the backlog or at the front.
    pub fn insert(&self, new: NewFeature, placement: Placement) -> QueueResult<Feature> {
        let view = self.view()?;
        let priority = match placement {
            Placement::Back => priority::append(view.pending_priorities()),
            Placement::Front => priority::front(view.pending_priorities()),
        };

        let feature = Feature::new(new, priority);
        self.store.insert_feature(&feature)?;
        tracing::info!(
            "Inserted feature {} ({}) at priority {}",
            feature.id,
            feature.name,
            feature.priority
        );
        Ok(feature)
    }

    /// Parse a document in the text format and insert every feature in it.
    ///
    /// Nothing is inserted if any block fails validation. Returned features are
    /// in document order, which is also their queue order.
    pub fn import(&self, text: &str, placement: Placement) -> QueueResult<Vec<Feature>> {
        let parsed = intake::parse_features(text)?;

        let mut inserted = match placement {
            Placement::Back => parsed
                .into_iter()
                .map(|new| self.insert(new, placement))
                .collect::<QueueResult<Vec<_>>>()?,
            // Each front insert goes ahead of the previous one, so go last to first.
            Placement::Front => parsed
                .into_iter()
                .rev()
                .map(|new| self.insert(new, placement))
                .collect::<QueueResult<Vec<_>>>()?,
        };
        if placement == Placement::Front {
            inserted.reverse();
        }
        Ok(inserted)
    }

    // ============================================================
    // Operator transitions
    // ============================================================

    pub fn skip(&self, id: Uuid) -> QueueResult<Feature> {
        self.updated(id, OperatorAction::Skip)
    }

    pub fn retry(&self, id: Uuid) -> QueueResult<Feature> {
        self.updated(id, OperatorAction::Retry)
    }

    pub fn complete(&self, id: Uuid) -> QueueResult<Feature> {
        self.updated(id, OperatorAction::Complete)
    }

    pub fn requeue(&self, id: Uuid) -> QueueResult<Feature> {
        self.updated(id, OperatorAction::Requeue)
    }

    pub fn delete(&self, id: Uuid) -> QueueResult<()> {
        self.apply(id, OperatorAction::Delete).map(|_| ())
    }

    /// Apply an operator action to the latest stored copy of a feature.
    ///
    /// Returns the updated feature, or `None` once it has been deleted.
    pub fn apply(&self, id: Uuid, action: OperatorAction) -> QueueResult<Option<Feature>> {
        let feature = self.get(id)?;
        match lifecycle::operator_transition(action, feature.status, Utc::now()) {
            Some(Effect::Update(patch)) => {
                let updated = self.write(feature, &patch, action.as_str())?;
                tracing::info!("Feature {} {}: now {}", id, action.as_str(), updated.status);
                Ok(Some(updated))
            }
            Some(Effect::Remove) => {
                if !self.store.delete_feature(id, Some(feature.status))? {
                    return Err(self.stale(id, action.as_str()));
                }
                tracing::info!("Deleted feature {} ({})", id, feature.name);
                Ok(None)
            }
            None => Err(self.refuse(&feature, action.as_str())),
        }
    }

    fn updated(&self, id: Uuid, action: OperatorAction) -> QueueResult<Feature> {
        self.apply(id, action)?.ok_or(QueueError::NotFound(id))
    }

    // ============================================================
    // Reordering
    // ============================================================

    pub fn move_to_top(&self, id: Uuid) -> QueueResult<Feature> {
        let (feature, view) = self.pending_with_view(id, "move to top")?;
        let target = priority::top(view.pending_priorities(), feature.priority);
        self.write(feature, &FeaturePatch::priority(target), "move to top")
    }

    pub fn move_up(&self, id: Uuid) -> QueueResult<Feature> {
        let feature = self.get(id)?;
        if feature.status != FeatureStatus::Pending {
            return Err(self.refuse(&feature, "move up"));
        }
        let target = priority::move_up(feature.priority);
        self.write(feature, &FeaturePatch::priority(target), "move up")
    }

    /// Respace pending priorities to `1, 2, 3, ...` in their current order.
    ///
    /// Returns how many features were rewritten. A feature that stops being
    /// pending mid-way is left alone.
    pub fn compact(&self) -> QueueResult<usize> {
        let view = self.view()?;
        let mut written = 0;
        for (id, target) in priority::compact(view.with_status(FeatureStatus::Pending)) {
            if self.store.update_feature(
                id,
                Some(FeatureStatus::Pending),
                &FeaturePatch::priority(target),
            )? {
                written += 1;
            }
        }
        tracing::info!("Compacted {} pending priorities", written);
        Ok(written)
    }

    // ============================================================
    // Engine control plane
    // ============================================================

    pub fn config(&self) -> QueueResult<EngineConfig> {
        let entries = self.store.select_config()?;
        Ok(control::engine_config(&entries))
    }

    /// Write each present field as its own key, then read the config back.
    pub fn update_config(&self, input: UpdateConfigInput) -> QueueResult<EngineConfig> {
        for (key, value) in control::config_writes(&input) {
            self.store.upsert_config(key, &value)?;
            tracing::info!("Config {} set to {}", key, value);
        }
        self.config()
    }

    pub fn set_paused(&self, paused: bool) -> QueueResult<EngineConfig> {
        self.update_config(UpdateConfigInput {
            engine_paused: Some(paused),
            ..UpdateConfigInput::default()
        })
    }

    pub fn engine_status(&self) -> QueueResult<EngineStatus> {
        let config = self.config()?;
        let view = self.view()?;
        Ok(control::engine_status(config.engine_paused, view.is_building()))
    }

    // ============================================================
    // Worker
    // ============================================================

    /// Claim the next pending feature for the worker.
    ///
    /// Returns `None` while the engine is paused, while something is already in
    /// progress, or when nothing is pending. If another claimer wins a race for
    /// a feature, the next one in line is tried.
    pub fn claim_next(&self) -> QueueResult<Option<Feature>> {
        if self.config()?.engine_paused {
            tracing::debug!("Engine paused, not claiming");
            return Ok(None);
        }

        let view = self.view()?;
        if let Some(current) = view.current() {
            tracing::debug!("Feature {} already in progress, not claiming", current.id);
            return Ok(None);
        }

        for candidate in view.with_status(FeatureStatus::Pending) {
            let Some(patch) = lifecycle::worker_transition(
                &WorkerEvent::Claim,
                candidate.status,
                candidate.retry_count,
                Utc::now(),
            ) else {
                continue;
            };
            if self
                .store
                .update_feature(candidate.id, Some(FeatureStatus::Pending), &patch)?
            {
                let mut claimed = candidate.clone();
                patch.apply_to(&mut claimed);
                tracing::info!("Claimed feature {} ({})", claimed.id, claimed.name);
                return Ok(Some(claimed));
            }
        }
        Ok(None)
    }

    pub fn succeed(&self, id: Uuid) -> QueueResult<Feature> {
        self.report(id, WorkerEvent::Succeed)
    }

    pub fn fail(&self, id: Uuid, message: impl Into<String>) -> QueueResult<Feature> {
        let skip_on_error = self.config()?.skip_on_error;
        self.report(
            id,
            WorkerEvent::Fail {
                message: message.into(),
                skip_on_error,
            },
        )
    }

    fn report(&self, id: Uuid, event: WorkerEvent) -> QueueResult<Feature> {
        let feature = self.get(id)?;
        let patch = lifecycle::worker_transition(
            &event,
            feature.status,
            feature.retry_count,
            Utc::now(),
        )
        .ok_or_else(|| self.refuse(&feature, event.as_str()))?;

        let updated = self.write(feature, &patch, event.as_str())?;
        match updated.status {
            FeatureStatus::Completed => tracing::info!("Feature {} completed", id),
            status => tracing::warn!(
                "Feature {} {}: {}",
                id,
                status,
                updated.error_message.as_deref().unwrap_or_default()
            ),
        }
        Ok(updated)
    }

    // ============================================================
    // Logs
    // ============================================================

    /// The most recent log entries, newest first, at most [`MAX_LOG_WINDOW`].
    pub fn logs(&self, limit: usize) -> QueueResult<Vec<LogEntry>> {
        Ok(self.store.select_logs(limit.min(MAX_LOG_WINDOW))?)
    }

    pub fn append_log(&self, input: CreateLogInput) -> QueueResult<LogEntry> {
        if input.message.trim().is_empty() {
            return Err(QueueError::validation("log message must not be empty"));
        }
        let entry = LogEntry {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            level: input.level,
            message: input.message,
        };
        self.store.insert_log(&entry)?;
        Ok(entry)
    }

    // ============================================================
    // Helpers
    // ============================================================

    fn pending_with_view(&self, id: Uuid, action: &'static str) -> QueueResult<(Feature, QueueView)> {
        let view = self.view()?;
        let feature = view.get(id).cloned().ok_or(QueueError::NotFound(id))?;
        if feature.status != FeatureStatus::Pending {
            return Err(self.refuse(&feature, action));
        }
        Ok((feature, view))
    }

    /// Write `patch` if the feature still has the status it was read with.
    fn write(
        &self,
        mut feature: Feature,
        patch: &FeaturePatch,
        action: &'static str,
    ) -> QueueResult<Feature> {
        if !self
            .store
            .update_feature(feature.id, Some(feature.status), patch)?
        {
            return Err(self.stale(feature.id, action));
        }
        patch.apply_to(&mut feature);
        Ok(feature)
    }

    fn refuse(&self, feature: &Feature, action: &'static str) -> QueueError {
        tracing::warn!(
            "Refusing to {} feature {}: status is {}",
            action,
            feature.id,
            feature.status
        );
        QueueError::Precondition {
            id: feature.id,
            action,
            status: feature.status,
        }
    }

    /// Explain a filtered write that matched nothing: the record was deleted or
    /// changed status after it was read.
    fn stale(&self, id: Uuid, action: &'static str) -> QueueError {
        match self.store.get_feature(id) {
            Ok(Some(current)) => self.refuse(&current, action),
            Ok(None) => QueueError::NotFound(id),
            Err(e) => QueueError::Store(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::store::MemoryStore;

    type Interference = Box<dyn FnOnce(&MemoryStore) + Send>;

    /// Runs one change against the store just before the next filtered write,
    /// standing in for a second client acting between read and write.
    #[derive(Default)]
    struct InterleavedStore {
        inner: MemoryStore,
        pending: Mutex<Option<Interference>>,
    }

    impl InterleavedStore {
        fn before_next_write(&self, change: impl FnOnce(&MemoryStore) + Send + 'static) {
            *self.pending.lock().unwrap() = Some(Box::new(change));
        }

        fn interfere(&self) {
            if let Some(change) = self.pending.lock().unwrap().take() {
                change(&self.inner);
            }
        }
    }

    impl Store for InterleavedStore {
        fn select_features(&self) -> anyhow::Result<Vec<Feature>> {
            self.inner.select_features()
        }

        fn get_feature(&self, id: Uuid) -> anyhow::Result<Option<Feature>> {
            self.inner.get_feature(id)
        }

        fn insert_feature(&self, feature: &Feature) -> anyhow::Result<()> {
            self.inner.insert_feature(feature)
        }

        fn update_feature(
            &self,
            id: Uuid,
            expected: Option<FeatureStatus>,
            patch: &FeaturePatch,
        ) -> anyhow::Result<bool> {
            self.interfere();
            self.inner.update_feature(id, expected, patch)
        }

        fn delete_feature(&self, id: Uuid, expected: Option<FeatureStatus>) -> anyhow::Result<bool> {
            self.interfere();
            self.inner.delete_feature(id, expected)
        }

        fn select_config(&self) -> anyhow::Result<Vec<(String, String)>> {
            self.inner.select_config()
        }

        fn upsert_config(&self, key: &str, value: &str) -> anyhow::Result<()> {
            self.inner.upsert_config(key, value)
        }

        fn select_logs(&self, limit: usize) -> anyhow::Result<Vec<LogEntry>> {
            self.inner.select_logs(limit)
        }

        fn insert_log(&self, entry: &LogEntry) -> anyhow::Result<()> {
            self.inner.insert_log(entry)
        }
    }

    fn setup() -> (FeatureQueue<InterleavedStore>, Feature) {
        let queue = FeatureQueue::new(InterleavedStore::default());
        let feature = queue
            .create(CreateFeatureInput {
                name: "a".to_string(),
                description: None,
                category: None,
                instructions: None,
                placement: Placement::Back,
            })
            .unwrap();
        (queue, feature)
    }

    fn set_status(id: Uuid, status: FeatureStatus) -> impl FnOnce(&MemoryStore) + Send {
        move |store| {
            let patch = FeaturePatch {
                status: Some(status),
                ..FeaturePatch::default()
            };
            assert!(store.update_feature(id, None, &patch).unwrap());
        }
    }

    #[test]
    fn skip_loses_to_a_concurrent_claim() {
        let (queue, feature) = setup();
        queue
            .store
            .before_next_write(set_status(feature.id, FeatureStatus::InProgress));

        let result = queue.skip(feature.id);

        assert!(matches!(
            result,
            Err(QueueError::Precondition {
                status: FeatureStatus::InProgress,
                ..
            })
        ));
        let stored = queue.get(feature.id).unwrap();
        assert_eq!(stored.status, FeatureStatus::InProgress);
        assert_eq!(stored.priority, feature.priority);
    }

    #[test]
    fn move_to_top_does_not_reorder_a_feature_that_stopped_being_pending() {
        let (queue, feature) = setup();
        queue
            .store
            .before_next_write(set_status(feature.id, FeatureStatus::Completed));

        let result = queue.move_to_top(feature.id);

        assert!(matches!(result, Err(QueueError::Precondition { .. })));
        let stored = queue.get(feature.id).unwrap();
        assert_eq!(stored.status, FeatureStatus::Completed);
        assert_eq!(stored.priority, feature.priority);
    }

    #[test]
    fn transition_on_a_concurrently_deleted_feature_is_not_found() {
        let (queue, feature) = setup();
        let id = feature.id;
        queue.store.before_next_write(move |store| {
            assert!(store.delete_feature(id, None).unwrap());
        });

        assert!(matches!(queue.skip(id), Err(QueueError::NotFound(_))));
        assert!(queue.list(None).unwrap().is_empty());
    }

    #[test]
    fn delete_refuses_a_feature_claimed_in_the_meantime() {
        let (queue, feature) = setup();
        queue
            .store
            .before_next_write(set_status(feature.id, FeatureStatus::InProgress));

        let result = queue.delete(feature.id);

        assert!(matches!(result, Err(QueueError::Precondition { .. })));
        assert_eq!(
            queue.get(feature.id).unwrap().status,
            FeatureStatus::InProgress
        );
    }

    #[test]
    fn delete_of_a_feature_removed_in_the_meantime_is_not_found() {
        let (queue, feature) = setup();
        let id = feature.id;
        queue.store.before_next_write(move |store| {
            assert!(store.delete_feature(id, None).unwrap());
        });

        assert!(matches!(queue.delete(id), Err(QueueError::NotFound(_))));
    }
}
