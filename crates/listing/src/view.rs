//! Client-facing snapshot of a listing request.

use chrono::{DateTime, Utc};
use qlist_core::JobId;
use serde::{Deserialize, Serialize};

use crate::record::{JobRecord, ListingState};

/// Wire shape of a listing request. `finished` is derived from `state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRequestView<T> {
    pub id: JobId,
    pub uri: String,
    pub submission_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub percent_completed: u8,
    pub finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub state: ListingState,
    pub results: Vec<T>,
}

impl<T: Clone> From<&JobRecord<T>> for ListingRequestView<T> {
    fn from(record: &JobRecord<T>) -> Self {
        Self {
            id: record.id(),
            uri: record.uri().to_string(),
            submission_time: record.submission_time(),
            last_updated: record.last_updated(),
            percent_completed: record.percent_completed(),
            finished: record.is_finished(),
            failure_reason: record.failure_reason().map(String::from),
            state: record.state(),
            results: record.results().to_vec(),
        }
    }
}

impl<T> From<JobRecord<T>> for ListingRequestView<T> {
    fn from(record: JobRecord<T>) -> Self {
        Self {
            id: record.id(),
            uri: record.uri().to_string(),
            submission_time: record.submission_time(),
            last_updated: record.last_updated(),
            percent_completed: record.percent_completed(),
            finished: record.is_finished(),
            failure_reason: record.failure_reason().map(String::from),
            state: record.state(),
            results: record.into_results(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlist_core::{IdGenerator, UuidGenerator};

    fn record() -> JobRecord<String> {
        let id = UuidGenerator.next_id();
        JobRecord::new(id, format!("/listing-requests/{}", id), Utc::now())
    }

    #[test]
    fn test_running_view_shape() {
        let mut r = record();
        r.start().unwrap();
        r.report_progress(25);

        let json = serde_json::to_value(ListingRequestView::from(&r)).unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(json["finished"], false);
        assert_eq!(json["percentCompleted"], 25);
        assert!(json.get("failureReason").is_none());
        assert!(json["submissionTime"].is_string());
        assert_eq!(json["results"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_completed_view_carries_results() {
        let mut r = record();
        r.start().unwrap();
        r.complete(vec!["a".to_string(), "b".to_string()]).unwrap();

        let view = ListingRequestView::from(r);
        assert!(view.finished);
        assert_eq!(view.percent_completed, 100);
        assert_eq!(view.results, vec!["a", "b"]);
    }

    #[test]
    fn test_failed_view_has_reason() {
        let mut r = record();
        r.fail("queue unavailable").unwrap();
        let json = serde_json::to_value(ListingRequestView::from(&r)).unwrap();
        assert_eq!(json["finished"], true);
        assert_eq!(json["failureReason"], "queue unavailable");
    }
}
