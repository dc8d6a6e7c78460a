use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use uuid::Uuid;

use super::Store;
use crate::models::{Feature, FeaturePatch, FeatureStatus, LogEntry};

#[derive(Default)]
struct Tables {
    features: Vec<Feature>,
    config: Vec<(String, String)>,
    logs: Vec<LogEntry>,
}

/// In-memory [`Store`] for tests.
///
/// Rows keep insertion order, matching what SQLite returns for `ORDER BY rowid`.
/// [`MemoryStore::set_unavailable`] makes every call fail, to exercise the
/// store-failure paths.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("store unavailable");
        }
        Ok(())
    }
}

fn status_matches(feature: &Feature, expected: Option<FeatureStatus>) -> bool {
    expected.map_or(true, |status| feature.status == status)
}

impl Store for MemoryStore {
    fn select_features(&self) -> Result<Vec<Feature>> {
        self.check()?;
        let tables = self.tables.lock().expect("store lock poisoned");
        Ok(tables.features.clone())
    }

    fn get_feature(&self, id: Uuid) -> Result<Option<Feature>> {
        self.check()?;
        let tables = self.tables.lock().expect("store lock poisoned");
        Ok(tables.features.iter().find(|f| f.id == id).cloned())
    }

    fn insert_feature(&self, feature: &Feature) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.lock().expect("store lock poisoned");
        if tables.features.iter().any(|f| f.id == feature.id) {
            anyhow::bail!("duplicate feature id {}", feature.id);
        }
        tables.features.push(feature.clone());
        Ok(())
    }

    fn update_feature(
        &self,
        id: Uuid,
        expected: Option<FeatureStatus>,
        patch: &FeaturePatch,
    ) -> Result<bool> {
        self.check()?;
        if patch.is_empty() {
            return Ok(false);
        }
        let mut tables = self.tables.lock().expect("store lock poisoned");
        match tables
            .features
            .iter_mut()
            .find(|f| f.id == id && status_matches(f, expected))
        {
            Some(feature) => {
                patch.apply_to(feature);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_feature(&self, id: Uuid, expected: Option<FeatureStatus>) -> Result<bool> {
        self.check()?;
        let mut tables = self.tables.lock().expect("store lock poisoned");
        let before = tables.features.len();
        tables
            .features
            .retain(|f| !(f.id == id && status_matches(f, expected)));
        Ok(tables.features.len() < before)
    }

    fn select_config(&self) -> Result<Vec<(String, String)>> {
        self.check()?;
        let tables = self.tables.lock().expect("store lock poisoned");
        Ok(tables.config.clone())
    }

    fn upsert_config(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.lock().expect("store lock poisoned");
        match tables.config.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => tables.config.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn select_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.check()?;
        let tables = self.tables.lock().expect("store lock poisoned");
        Ok(tables.logs.iter().rev().take(limit).cloned().collect())
    }

    fn insert_log(&self, entry: &LogEntry) -> Result<()> {
        self.check()?;
        let mut tables = self.tables.lock().expect("store lock poisoned");
        tables.logs.push(entry.clone());
        Ok(())
    }
}
