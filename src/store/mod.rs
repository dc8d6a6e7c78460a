//! Persistent store abstraction.
//!
//! The queue talks to its backing tables only through [`Store`]: read-all,
//! filtered update-by-id, insert, delete and upsert-by-key. No operation spans
//! more than one row, so implementations need no cross-row transactions.
//!
//! [`crate::db::Database`] is the SQLite implementation; [`MemoryStore`] is an
//! in-process fake used by tests.

mod memory;

use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use crate::models::{Feature, FeaturePatch, FeatureStatus, LogEntry};

pub use memory::MemoryStore;

/// Storage capability injected into [`crate::queue::FeatureQueue`].
pub trait Store: Send + Sync {
    /// All features in stored (insertion) order.
    fn select_features(&self) -> Result<Vec<Feature>>;

    fn get_feature(&self, id: Uuid) -> Result<Option<Feature>>;

    fn insert_feature(&self, feature: &Feature) -> Result<()>;

    /// Apply `patch` to the feature with `id`.
    ///
    /// When `expected` is given the write only happens if the stored status still
    /// matches it. Returns `false` if no row was written.
    fn update_feature(
        &self,
        id: Uuid,
        expected: Option<FeatureStatus>,
        patch: &FeaturePatch,
    ) -> Result<bool>;

    /// Delete the feature with `id`, filtered on `expected` like [`Store::update_feature`].
    fn delete_feature(&self, id: Uuid, expected: Option<FeatureStatus>) -> Result<bool>;

    /// Raw config pairs as stored.
    fn select_config(&self) -> Result<Vec<(String, String)>>;

    fn upsert_config(&self, key: &str, value: &str) -> Result<()>;

    /// The `limit` most recent log entries, newest first.
    fn select_logs(&self, limit: usize) -> Result<Vec<LogEntry>>;

    fn insert_log(&self, entry: &LogEntry) -> Result<()>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn select_features(&self) -> Result<Vec<Feature>> {
        (**self).select_features()
    }

    fn get_feature(&self, id: Uuid) -> Result<Option<Feature>> {
        (**self).get_feature(id)
    }

    fn insert_feature(&self, feature: &Feature) -> Result<()> {
        (**self).insert_feature(feature)
    }

    fn update_feature(
        &self,
        id: Uuid,
        expected: Option<FeatureStatus>,
        patch: &FeaturePatch,
    ) -> Result<bool> {
        (**self).update_feature(id, expected, patch)
    }

    fn delete_feature(&self, id: Uuid, expected: Option<FeatureStatus>) -> Result<bool> {
        (**self).delete_feature(id, expected)
    }

    fn select_config(&self) -> Result<Vec<(String, String)>> {
        (**self).select_config()
    }

    fn upsert_config(&self, key: &str, value: &str) -> Result<()> {
        (**self).upsert_config(key, value)
    }

    fn select_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        (**self).select_logs(limit)
    }

    fn insert_log(&self, entry: &LogEntry) -> Result<()> {
        (**self).insert_log(entry)
    }
}
