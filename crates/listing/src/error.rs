//! Listing error types.

use qlist_core::{ConfigError, JobId};
use thiserror::Error;

use crate::record::ListingState;

/// Call-level failures of the listing engine.
///
/// Per-job problems (launch or enumeration errors) never show up here; they
/// are recorded on the job as its failure reason.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ListingError {
    #[error("listing request not found: {0}")]
    NotFound(JobId),

    #[error("listing request {id} is {state}, operation not allowed")]
    InvalidState { id: JobId, state: ListingState },

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("invalid listing config: {0}")]
    InvalidConfig(#[from] ConfigError),
}
