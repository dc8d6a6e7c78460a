//! Polling observer.
//!
//! The observer re-reads the whole queue on a fixed interval and replaces its
//! view wholesale; it never patches a cached copy. Differences between two
//! consecutive snapshots are reported as [`Change`]s, which the CLI prints as
//! notifications. A failed or timed-out poll keeps the last good snapshot.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::client::QueueClient;
use crate::models::{EngineStatus, FeatureStatus, DEFAULT_LOG_WINDOW};
use crate::queue::{FeatureQueue, QueueSnapshot};
use crate::store::Store;

/// Something that can produce a fresh snapshot.
pub trait SnapshotSource {
    fn fetch(&self) -> impl Future<Output = anyhow::Result<QueueSnapshot>> + Send;
}

impl SnapshotSource for QueueClient {
    fn fetch(&self) -> impl Future<Output = anyhow::Result<QueueSnapshot>> + Send {
        async move { Ok(self.snapshot(None).await?) }
    }
}

/// Read the store directly, for observing a local database.
impl<S: Store> SnapshotSource for FeatureQueue<S> {
    fn fetch(&self) -> impl Future<Output = anyhow::Result<QueueSnapshot>> + Send {
        let result = self.snapshot(DEFAULT_LOG_WINDOW).map_err(anyhow::Error::from);
        async move { result }
    }
}

/// A difference between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Added {
        id: Uuid,
        name: String,
    },
    Removed {
        id: Uuid,
        name: String,
    },
    StatusChanged {
        id: Uuid,
        name: String,
        from: FeatureStatus,
        to: FeatureStatus,
    },
    EngineStatusChanged {
        from: EngineStatus,
        to: EngineStatus,
    },
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added { name, .. } => write!(f, "added: {}", name),
            Self::Removed { name, .. } => write!(f, "removed: {}", name),
            Self::StatusChanged { name, from, to, .. } => {
                write!(f, "{}: {} -> {}", name, from, to)
            }
            Self::EngineStatusChanged { from, to } => write!(f, "engine: {} -> {}", from, to),
        }
    }
}

/// Everything that changed from `prev` to `next`.
pub fn diff(prev: &QueueSnapshot, next: &QueueSnapshot) -> Vec<Change> {
    let mut changes = Vec::new();

    for feature in &next.features {
        match prev.feature(feature.id) {
            None => changes.push(Change::Added {
                id: feature.id,
                name: feature.name.clone(),
            }),
            Some(old) if old.status != feature.status => changes.push(Change::StatusChanged {
                id: feature.id,
                name: feature.name.clone(),
                from: old.status,
                to: feature.status,
            }),
            Some(_) => {}
        }
    }

    for feature in &prev.features {
        if next.feature(feature.id).is_none() {
            changes.push(Change::Removed {
                id: feature.id,
                name: feature.name.clone(),
            });
        }
    }

    if prev.engine_status != next.engine_status {
        changes.push(Change::EngineStatusChanged {
            from: prev.engine_status,
            to: next.engine_status,
        });
    }

    changes
}

/// Result of a single poll.
#[derive(Debug)]
pub enum PollOutcome {
    /// A new snapshot replaced the previous one.
    Updated(Vec<Change>),
    /// The source failed; the previous snapshot is kept.
    Failed(String),
    /// The poll took longer than the interval and was abandoned.
    TimedOut,
}

pub struct Observer<S> {
    source: S,
    interval: Duration,
    last: Option<QueueSnapshot>,
}

impl<S: SnapshotSource> Observer<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            source,
            interval,
            last: None,
        }
    }

    /// The last successfully fetched snapshot.
    pub fn last(&self) -> Option<&QueueSnapshot> {
        self.last.as_ref()
    }

    /// Fetch once, bounded by the poll interval.
    pub async fn poll_once(&mut self) -> PollOutcome {
        match tokio::time::timeout(self.interval, self.source.fetch()).await {
            Ok(Ok(snapshot)) => {
                let changes = match self.last {
                    Some(ref prev) => diff(prev, &snapshot),
                    None => Vec::new(),
                };
                self.last = Some(snapshot);
                PollOutcome::Updated(changes)
            }
            Ok(Err(e)) => {
                tracing::warn!("Poll failed, keeping last snapshot: {:#}", e);
                PollOutcome::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!("Poll timed out after {:?}", self.interval);
                PollOutcome::TimedOut
            }
        }
    }

    /// Poll every interval until `shutdown` resolves, calling `on_update` after
    /// each successful poll.
    pub async fn run<F>(&mut self, shutdown: impl Future<Output = ()>, mut on_update: F)
    where
        F: FnMut(&QueueSnapshot, &[Change]),
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let PollOutcome::Updated(changes) = self.poll_once().await {
                        for change in &changes {
                            tracing::info!("{}", change);
                        }
                        if let Some(ref snapshot) = self.last {
                            on_update(snapshot, &changes);
                        }
                    }
                }
            }
        }
    }
}
