//! In-memory registry of listing jobs.
//!
//! Uses `IndexMap` to preserve insertion order (newest last) while allowing
//! O(1) lookups by job ID. Each record sits behind its own `Mutex`, so updates
//! to one job are totally ordered without holding the map lock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, info};

use qlist_core::{Clock, IdGenerator, JobId, ListingConfig};

use crate::error::ListingError;
use crate::record::JobRecord;

/// How many fresh ids to try before declaring the id space exhausted.
const MAX_ID_ATTEMPTS: usize = 8;

type SharedRecord<T> = Arc<Mutex<JobRecord<T>>>;

pub struct JobStore<T> {
    jobs: RwLock<IndexMap<JobId, SharedRecord<T>>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: ListingConfig,
}

// Poisoning only means another thread panicked mid-update; the data is still
// a valid record, so keep serving it.
fn lock_record<T>(record: &SharedRecord<T>) -> MutexGuard<'_, JobRecord<T>> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Clone> JobStore<T> {
    pub fn new(config: &ListingConfig, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            jobs: RwLock::new(IndexMap::new()),
            clock,
            ids,
            config: config.clone(),
        }
    }

    /// Allocate a fresh id and insert a Submitted record for it.
    pub fn create(&self) -> Result<JobRecord<T>, ListingError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if jobs.len() >= self.config.max_jobs {
            return Err(ListingError::ResourceExhausted(format!(
                "job store at capacity ({} jobs)",
                self.config.max_jobs
            )));
        }

        let id = (0..MAX_ID_ATTEMPTS)
            .map(|_| self.ids.next_id())
            .find(|id| !jobs.contains_key(id))
            .ok_or_else(|| {
                ListingError::ResourceExhausted(format!(
                    "no unused job id after {} attempts",
                    MAX_ID_ATTEMPTS
                ))
            })?;

        let record = JobRecord::new(id, self.config.uri_for(id), self.clock.now());
        jobs.insert(id, Arc::new(Mutex::new(record.clone())));
        debug!(job_id = %id, "listing job created");
        Ok(record)
    }

    /// Snapshot of a single job.
    pub fn get(&self, id: JobId) -> Result<JobRecord<T>, ListingError> {
        let record = self.entry(id)?;
        let guard = lock_record(&record);
        Ok(guard.clone())
    }

    /// Apply `mutator` under the record's lock.
    ///
    /// On success `lastUpdated` is bumped; a mutator error leaves the record
    /// untouched and is returned as-is.
    pub fn update<R>(
        &self,
        id: JobId,
        mutator: impl FnOnce(&mut JobRecord<T>) -> Result<R, ListingError>,
    ) -> Result<R, ListingError> {
        let record = self.entry(id)?;
        let mut guard = lock_record(&record);
        let out = mutator(&mut *guard)?;
        guard.touch(self.clock.now());
        Ok(out)
    }

    /// Raise a running job's progress. `lastUpdated` moves only when the
    /// percentage actually went up; returns whether it did.
    pub fn report_progress(&self, id: JobId, percent: u8) -> Result<bool, ListingError> {
        let record = self.entry(id)?;
        let mut guard = lock_record(&record);
        let changed = guard.report_progress(percent);
        if changed {
            guard.touch(self.clock.now());
        }
        Ok(changed)
    }

    pub fn delete(&self, id: JobId) -> Result<(), ListingError> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        jobs.shift_remove(&id)
            .map(|_| ())
            .ok_or(ListingError::NotFound(id))
    }

    /// Remove every terminal job idle for longer than `window`. Returns how many went.
    pub fn sweep(&self, now: DateTime<Utc>, window: Duration) -> usize {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let before = jobs.len();
        jobs.retain(|_, record| !lock_record(record).is_expired(now, window));
        let removed = before - jobs.len();
        if removed > 0 {
            info!(removed, remaining = jobs.len(), "swept expired listing jobs");
        }
        removed
    }

    /// Snapshots of all jobs in submission order.
    pub fn list(&self) -> Vec<JobRecord<T>> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.values().map(|record| lock_record(record).clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, id: JobId) -> Result<SharedRecord<T>, ListingError> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&id).cloned().ok_or(ListingError::NotFound(id))
    }
}
