//! Completion table shared by the simulation thread and request tasks.
//!
//! The driver publishes each result exactly once; the matching waiter takes
//! it out. Waiters are woken through a [`Notify`] rather than by polling.
//! Results whose waiter already gave up stay in the table until
//! [`ResultTable::evict_older_than`] sweeps them. A taken result leaves a
//! tombstone behind so the id cannot be published again until it is swept.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::error::CoreError;
use crate::job::JobResult;
use crate::types::JobId;

/// Default table size above which publishing logs a resource warning.
pub const DEFAULT_WARN_SIZE: usize = 10_000;

struct Published {
    /// `None` once the result has been taken.
    result: Option<JobResult>,
    published_at: Instant,
}

pub struct ResultTable {
    entries: Mutex<HashMap<JobId, Published>>,
    notify: Notify,
    warn_size: usize,
}

impl ResultTable {
    pub fn new(warn_size: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            warn_size,
        }
    }

    /// The lock only guards map operations, so a panic while holding it
    /// cannot leave an entry half-written.
    fn entries(&self) -> MutexGuard<'_, HashMap<JobId, Published>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the result for `id` and wake every waiter.
    ///
    /// A second publish for the same id is rejected, whether or not the
    /// first result has been taken yet; the first result wins.
    pub fn publish(&self, id: JobId, result: JobResult) -> Result<(), CoreError> {
        let size = {
            let mut entries = self.entries();
            if entries.contains_key(&id) {
                tracing::warn!(job_id = %id, "Duplicate result publish rejected");
                return Err(CoreError::AlreadyPublished(id));
            }
            entries.insert(
                id,
                Published {
                    result: Some(result),
                    published_at: Instant::now(),
                },
            );
            entries.len()
        };

        if size > self.warn_size {
            tracing::warn!(
                table_size = size,
                warn_size = self.warn_size,
                "Result table size above operational bound",
            );
        }

        self.notify.notify_waiters();
        Ok(())
    }

    /// Remove and return the result for `id`, if published.
    pub fn take(&self, id: JobId) -> Option<JobResult> {
        self.entries().get_mut(&id).and_then(|p| p.result.take())
    }

    /// Wait up to `timeout` for the result of `id`.
    ///
    /// On success the entry is removed (at-most-once delivery). On timeout a
    /// `TimedOut` result is returned and the table is left untouched, so a
    /// late publish for the same id still succeeds.
    pub async fn await_result(&self, id: JobId, timeout: Duration) -> JobResult {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Register interest before checking, so a publish landing between
            // the check and the await is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(result) = self.take(id) {
                return result;
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.take(id).unwrap_or_else(|| JobResult::timed_out(id));
            }
        }
    }

    /// Drop results that nobody collected within `max_age`, along with the
    /// tombstones of collected ones. Returns the number of entries removed.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, p| p.published_at.elapsed() < max_age);
        before - entries.len()
    }

    /// Number of published results not yet collected.
    pub fn len(&self) -> usize {
        self.entries()
            .values()
            .filter(|p| p.result.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResultTable {
    fn default() -> Self {
        Self::new(DEFAULT_WARN_SIZE)
    }
}
