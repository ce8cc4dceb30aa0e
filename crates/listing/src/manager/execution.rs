use std::any::Any;
use std::sync::Arc;

use qlist_core::JobId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::enumerator::{Enumerator, ListingContext, Progress, ProgressReporter};
use crate::error::ListingError;
use crate::record::ListingState;
use crate::store::JobStore;

use super::core::{lock_active, ActiveJobs};

/// How an enumeration ended, before it is written to the record.
enum Outcome<T> {
    Finished(Vec<T>),
    Cancelled,
    Failed(String),
    /// The record was deleted out from under the job.
    Gone,
}

/// Everything one job's task needs.
#[derive(Clone)]
pub(super) struct JobRun<T> {
    id: JobId,
    store: Arc<JobStore<T>>,
    active: ActiveJobs,
    cancel: CancellationToken,
    max_results: usize,
}

impl<T: Clone + Send + Sync + 'static> JobRun<T> {
    pub(super) fn new(
        id: JobId,
        store: Arc<JobStore<T>>,
        active: ActiveJobs,
        cancel: CancellationToken,
        max_results: usize,
    ) -> Self {
        Self {
            id,
            store,
            active,
            cancel,
            max_results,
        }
    }

    /// Drive the enumerator on a child task and record whatever comes out.
    ///
    /// The child isolates panics: a panicking enumerator still leaves the job
    /// Failed rather than Running forever.
    pub(super) async fn supervise<E>(self, enumerator: E)
    where
        E: Enumerator<Item = T> + 'static,
    {
        let outcome = match tokio::spawn(self.clone().drive(enumerator)).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => Outcome::Failed(format!(
                "enumeration panicked: {}",
                panic_message(e.into_panic())
            )),
            Err(e) => Outcome::Failed(format!("enumeration task aborted: {}", e)),
        };

        self.finish(outcome);
        lock_active(&self.active).remove(&self.id);
    }

    async fn drive<E>(self, mut enumerator: E) -> Outcome<T>
    where
        E: Enumerator<Item = T>,
    {
        let ctx = ListingContext::new(self.cancel.clone(), self.progress_reporter(), self.max_results);

        // The record stays Submitted until the enumerator is ready, so a
        // start error is a launch failure straight from Submitted.
        if let Err(e) = enumerator.start(&ctx).await {
            return Outcome::Failed(format!(
                "failed to start {} enumeration: {:#}",
                enumerator.name(),
                e
            ));
        }

        if let Err(e) = self.store.update(self.id, |r| r.start()) {
            debug!(job_id = %self.id, error = %e, "listing job gone before it started");
            return Outcome::Gone;
        }

        let mut retained: Vec<T> = Vec::new();
        let mut seen = 0usize;
        loop {
            if self.cancel.is_cancelled() {
                return Outcome::Cancelled;
            }
            match enumerator.next_batch(&ctx).await {
                Ok(Some(batch)) => {
                    seen += batch.len();
                    retained.extend(batch);
                    if retained.len() > self.max_results {
                        enumerator.retain(&mut retained, self.max_results);
                        retained.truncate(self.max_results);
                    }
                }
                Ok(None) => break,
                Err(e) => return Outcome::Failed(format!("{:#}", e)),
            }
        }

        debug!(
            job_id = %self.id,
            seen,
            retained = retained.len(),
            "enumeration exhausted"
        );
        Outcome::Finished(retained)
    }

    fn progress_reporter(&self) -> ProgressReporter {
        let store = Arc::clone(&self.store);
        let id = self.id;
        ProgressReporter::new(move |progress: Progress| {
            let percent = progress.percent();
            if let Ok(true) = store.report_progress(id, percent) {
                debug!(
                    job_id = %id,
                    percent,
                    processed = progress.processed,
                    total = progress.total,
                    "listing progress"
                );
            }
        })
    }

    /// Write the terminal state. A pending cancel request wins over any outcome.
    fn finish(&self, outcome: Outcome<T>) {
        if matches!(outcome, Outcome::Gone) {
            return;
        }

        let mut overridden = None;
        let result = self.store.update(self.id, |r| {
            if r.cancel_requested() {
                if r.state() == ListingState::Submitted {
                    r.start()?;
                }
                r.cancel()?;
                overridden = Some(outcome);
            } else {
                match outcome {
                    Outcome::Finished(items) => r.complete(items)?,
                    Outcome::Failed(reason) => r.fail(reason)?,
                    Outcome::Cancelled => r.cancel()?,
                    Outcome::Gone => {}
                }
            }
            Ok((
                r.state(),
                r.results().len(),
                r.failure_reason().map(String::from),
            ))
        });

        match overridden {
            Some(Outcome::Failed(reason)) => {
                warn!(job_id = %self.id, error = %reason, "enumeration failed after cancel was requested");
            }
            Some(Outcome::Finished(items)) => {
                debug!(job_id = %self.id, discarded = items.len(), "enumeration finished after cancel was requested");
            }
            _ => {}
        }

        match result {
            Ok((ListingState::Completed, results, _)) => {
                info!(job_id = %self.id, results, "listing request completed");
            }
            Ok((ListingState::Cancelled, _, _)) => {
                info!(job_id = %self.id, "listing request cancelled");
            }
            Ok((ListingState::Failed, _, reason)) => {
                warn!(
                    job_id = %self.id,
                    reason = reason.as_deref().unwrap_or_default(),
                    "listing request failed"
                );
            }
            Ok((state, _, _)) => {
                warn!(job_id = %self.id, %state, "listing request finished in a non-terminal state");
            }
            Err(ListingError::NotFound(_)) => {
                debug!(job_id = %self.id, "listing job deleted before it finished");
            }
            Err(e) => {
                warn!(job_id = %self.id, error = %e, "could not record listing outcome");
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
