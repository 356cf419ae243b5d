use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sea_orm::{ConnectionTrait, DbErr};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::repository::{AlertCandidate, AlertRepository};

/// Trailing window in which an identical alert suppresses a new one.
pub fn dedup_window() -> Duration {
    Duration::hours(24)
}

/// Decides whether a candidate alert repeats one raised recently.
///
/// Matching is exact on plot, type, severity, percent change and source.
pub struct AlertDeduplicator<'a, C: ConnectionTrait> {
    repo: AlertRepository<'a, C>,
}

impl<'a, C: ConnectionTrait> AlertDeduplicator<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self {
            repo: AlertRepository::new(conn),
        }
    }

    /// `false` if an identical alert was created in the window ending at `now`.
    pub async fn should_create(
        &self,
        candidate: &AlertCandidate,
        now: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let since = now - dedup_window();
        Ok(self.repo.find_recent_match(candidate, since).await?.is_none())
    }
}

/// Per-plot async locks making dedup-check-then-create atomic within the
/// process.
#[derive(Clone, Default)]
pub struct AlertGate {
    locks: Arc<DashMap<i32, Arc<Mutex<()>>>>,
}

impl AlertGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `plot_id`'s alert stream.
    pub async fn lock(&self, plot_id: i32) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(plot_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock entry for a deleted plot.
    pub fn forget(&self, plot_id: i32) {
        self.locks.remove(&plot_id);
    }
}
