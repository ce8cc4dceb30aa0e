//! Job record: immutable identity plus a guarded status snapshot.
//!
//! Fields are private. Outside this crate a [`JobRecord`] is a read-only
//! snapshot; inside, mutation goes through [`crate::store::JobStore::update`]
//! and the transition methods below, which enforce the state machine.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use qlist_core::JobId;
use serde::{Deserialize, Serialize};

use crate::error::ListingError;

/// Highest progress a job may report before it has actually completed.
const MAX_RUNNING_PERCENT: u8 = 99;

const FALLBACK_FAILURE_REASON: &str = "enumeration failed without a reason";

/// Lifecycle state of a listing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingState {
    Submitted,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ListingState {
    /// Completed, Failed, and Cancelled accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: ListingState) -> bool {
        use ListingState::*;
        matches!(
            (self, next),
            (Submitted, Running)
                | (Submitted, Failed)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for ListingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Status of one listing job, generic over the item summary type.
#[derive(Debug, Clone)]
pub struct JobRecord<T> {
    id: JobId,
    uri: String,
    submission_time: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    percent_completed: u8,
    state: ListingState,
    failure_reason: Option<String>,
    results: Vec<T>,
    cancel_requested: bool,
}

impl<T> JobRecord<T> {
    pub(crate) fn new(id: JobId, uri: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            uri,
            submission_time: now,
            last_updated: now,
            percent_completed: 0,
            state: ListingState::Submitted,
            failure_reason: None,
            results: Vec::new(),
            cancel_requested: false,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn submission_time(&self) -> DateTime<Utc> {
        self.submission_time
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn percent_completed(&self) -> u8 {
        self.percent_completed
    }

    pub fn state(&self) -> ListingState {
        self.state
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Retained item summaries. Empty unless the job completed.
    pub fn results(&self) -> &[T] {
        &self.results
    }

    pub fn into_results(self) -> Vec<T> {
        self.results
    }

    /// Whether the job has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether a cancel was requested and not yet observed by the enumerator.
    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    /// True once a terminal record has been idle longer than `window`.
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        if !self.state.is_terminal() {
            return false;
        }
        (now - self.last_updated)
            .to_std()
            .map(|age| age > window)
            .unwrap_or(false)
    }

    // ── Guarded mutation ────────────────────────────────────────────

    fn transition(&mut self, next: ListingState) -> Result<(), ListingError> {
        if !self.state.can_transition_to(next) {
            return Err(ListingError::InvalidState {
                id: self.id,
                state: self.state,
            });
        }
        self.state = next;
        Ok(())
    }

    /// Never moves backwards, even if the clock does.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_updated {
            self.last_updated = now;
        }
    }

    pub(crate) fn start(&mut self) -> Result<(), ListingError> {
        self.transition(ListingState::Running)
    }

    /// Raise progress while running. Returns whether the value changed.
    pub(crate) fn report_progress(&mut self, percent: u8) -> bool {
        if self.state != ListingState::Running {
            return false;
        }
        let percent = percent.min(MAX_RUNNING_PERCENT);
        if percent <= self.percent_completed {
            return false;
        }
        self.percent_completed = percent;
        true
    }

    pub(crate) fn complete(&mut self, results: Vec<T>) -> Result<(), ListingError> {
        self.transition(ListingState::Completed)?;
        self.percent_completed = 100;
        self.results = results;
        self.cancel_requested = false;
        Ok(())
    }

    pub(crate) fn fail(&mut self, reason: impl Into<String>) -> Result<(), ListingError> {
        self.transition(ListingState::Failed)?;
        let reason = reason.into();
        self.failure_reason = Some(if reason.trim().is_empty() {
            FALLBACK_FAILURE_REASON.to_string()
        } else {
            reason
        });
        self.results.clear();
        self.cancel_requested = false;
        Ok(())
    }

    /// Partial results are discarded so a cancelled job never looks complete.
    pub(crate) fn cancel(&mut self) -> Result<(), ListingError> {
        self.transition(ListingState::Cancelled)?;
        self.results.clear();
        self.cancel_requested = false;
        Ok(())
    }

    pub(crate) fn request_cancel(&mut self) -> Result<(), ListingError> {
        if self.state.is_terminal() {
            return Err(ListingError::InvalidState {
                id: self.id,
                state: self.state,
            });
        }
        self.cancel_requested = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlist_core::{IdGenerator, UuidGenerator};

    fn record() -> JobRecord<u32> {
        let id = UuidGenerator.next_id();
        JobRecord::new(id, format!("/listing-requests/{}", id), Utc::now())
    }

    #[test]
    fn test_new_record_is_submitted() {
        let r = record();
        assert_eq!(r.state(), ListingState::Submitted);
        assert_eq!(r.percent_completed(), 0);
        assert_eq!(r.submission_time(), r.last_updated());
        assert!(r.failure_reason().is_none());
        assert!(!r.is_finished());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut r = record();
        r.start().unwrap();
        assert!(r.report_progress(40));
        r.complete(vec![1, 2, 3]).unwrap();
        assert_eq!(r.state(), ListingState::Completed);
        assert_eq!(r.percent_completed(), 100);
        assert_eq!(r.results(), &[1, 2, 3]);
    }

    #[test]
    fn test_progress_is_monotonic_and_capped() {
        let mut r = record();
        assert!(!r.report_progress(10), "no progress before running");
        r.start().unwrap();
        assert!(r.report_progress(50));
        assert!(!r.report_progress(30));
        assert_eq!(r.percent_completed(), 50);
        assert!(r.report_progress(100));
        assert_eq!(r.percent_completed(), 99);
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        let mut r = record();
        r.start().unwrap();
        r.cancel().unwrap();
        assert!(matches!(
            r.start(),
            Err(ListingError::InvalidState { state: ListingState::Cancelled, .. })
        ));
        assert!(r.complete(vec![1]).is_err());
        assert!(r.fail("late").is_err());
        assert!(r.request_cancel().is_err());
        assert!(r.results().is_empty());
    }

    #[test]
    fn test_cannot_revisit_submitted_or_skip_running() {
        let mut r = record();
        assert!(r.complete(vec![1]).is_err());
        assert!(r.cancel().is_err());
        r.start().unwrap();
        assert!(r.start().is_err());
    }

    #[test]
    fn test_fail_sets_reason_and_drops_results() {
        let mut r = record();
        r.fail("").unwrap();
        assert_eq!(r.state(), ListingState::Failed);
        assert_eq!(r.failure_reason(), Some(FALLBACK_FAILURE_REASON));
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let mut r = record();
        let before = r.last_updated();
        r.touch(before - chrono::Duration::seconds(10));
        assert_eq!(r.last_updated(), before);
        r.touch(before + chrono::Duration::seconds(10));
        assert!(r.last_updated() > before);
    }

    #[test]
    fn test_expiry_only_for_terminal() {
        let mut r = record();
        let later = r.last_updated() + chrono::Duration::seconds(600);
        assert!(!r.is_expired(later, Duration::from_secs(300)));
        r.fail("boom").unwrap();
        assert!(r.is_expired(later, Duration::from_secs(300)));
        assert!(!r.is_expired(later, Duration::from_secs(900)));
    }

    #[test]
    fn test_state_serde_names() {
        assert_eq!(serde_json::to_string(&ListingState::Cancelled).unwrap(), "\"cancelled\"");
        assert_eq!(ListingState::Running.to_string(), "running");
    }
}
