use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use qlist_core::{Clock, IdGenerator, JobId, ListingConfig, SystemClock, UuidGenerator};

use crate::enumerator::Enumerator;
use crate::error::ListingError;
use crate::record::JobRecord;
use crate::store::JobStore;

use super::execution::JobRun;

/// Cancel handles of jobs whose task is still alive.
pub(super) type ActiveJobs = Arc<Mutex<HashMap<JobId, CancellationToken>>>;

pub(super) fn lock_active(
    active: &Mutex<HashMap<JobId, CancellationToken>>,
) -> MutexGuard<'_, HashMap<JobId, CancellationToken>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Entry point for listing requests. Owns every job's lifecycle transitions.
///
/// Each submitted job runs its [`Enumerator`] on a dedicated tokio task; none
/// of the public methods wait on enumeration, only on a record lock.
pub struct ListingRequestManager<T> {
    pub(super) config: ListingConfig,
    pub(super) store: Arc<JobStore<T>>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) active: ActiveJobs,
}

impl<T: Clone + Send + Sync + 'static> ListingRequestManager<T> {
    /// Create a manager using wall-clock time and random UUID ids.
    pub fn new(config: ListingConfig) -> Result<Self, ListingError> {
        Self::with_collaborators(config, Arc::new(SystemClock), Arc::new(UuidGenerator))
    }

    /// Create a manager with explicit time and id sources.
    ///
    /// Fails with `InvalidConfig` when a limit in `config` is zero.
    pub fn with_collaborators(
        config: ListingConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, ListingError> {
        config.validate()?;
        let store = Arc::new(JobStore::new(&config, Arc::clone(&clock), ids));
        Ok(Self {
            config,
            store,
            clock,
            active: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &ListingConfig {
        &self.config
    }

    /// Register a job and start enumerating in the background.
    ///
    /// Returns the freshly created snapshot without waiting for any items. If
    /// the job cannot be launched it is recorded as Failed and that snapshot is
    /// returned instead; only an exhausted store is an error here.
    pub fn submit<E>(&self, enumerator: E) -> Result<JobRecord<T>, ListingError>
    where
        E: Enumerator<Item = T> + 'static,
    {
        let record = self.store.create()?;
        let id = record.id();
        let name = enumerator.name().to_string();

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(job_id = %id, enumerator = %name, error = %e, "listing request could not be launched");
                let reason = format!("failed to launch {} enumeration: {}", name, e);
                self.store.update(id, |r| r.fail(reason))?;
                return self.store.get(id);
            }
        };

        let cancel = CancellationToken::new();
        lock_active(&self.active).insert(id, cancel.clone());

        let run = JobRun::new(
            id,
            Arc::clone(&self.store),
            Arc::clone(&self.active),
            cancel,
            self.config.max_results,
        );
        runtime.spawn(run.supervise(enumerator));

        info!(
            job_id = %id,
            enumerator = %name,
            max_results = self.config.max_results,
            "listing request submitted"
        );
        Ok(record)
    }

    /// Current snapshot of a job.
    pub fn get(&self, id: JobId) -> Result<JobRecord<T>, ListingError> {
        self.store.get(id)
    }

    /// Snapshots of every tracked job, oldest first.
    pub fn list(&self) -> Vec<JobRecord<T>> {
        self.store.list()
    }

    /// Ask a job to stop.
    ///
    /// The returned snapshot usually still reads Running with
    /// `cancel_requested()` set; the job becomes Cancelled once its enumerator
    /// hands control back. Terminal jobs yield `InvalidState`.
    pub fn cancel(&self, id: JobId) -> Result<JobRecord<T>, ListingError> {
        self.store.update(id, |r| r.request_cancel())?;
        if let Some(token) = lock_active(&self.active).get(&id) {
            token.cancel();
        }
        info!(job_id = %id, "listing request cancellation requested");
        self.store.get(id)
    }

    /// Remove a job, stopping it first if it is still running.
    pub fn delete(&self, id: JobId) -> Result<(), ListingError> {
        match self.store.update(id, |r| r.request_cancel()) {
            Ok(()) | Err(ListingError::InvalidState { .. }) => {}
            Err(e) => return Err(e),
        }
        if let Some(token) = lock_active(&self.active).remove(&id) {
            token.cancel();
        }
        self.store.delete(id)?;
        info!(job_id = %id, "listing request deleted");
        Ok(())
    }

    /// Evict finished jobs older than the configured expiration window.
    pub fn sweep_expired(&self) -> usize {
        self.store.sweep(self.clock.now(), self.config.expiration())
    }

    /// Number of jobs whose enumeration task has not exited yet.
    pub fn active_count(&self) -> usize {
        lock_active(&self.active).len()
    }
}
