//! Asynchronous listing requests over large queues.
//!
//! A client submits an [`Enumerator`] to the [`ListingRequestManager`], gets a
//! [`JobRecord`] back immediately, and polls it until the job is Completed,
//! Failed, or Cancelled. Records live in a [`JobStore`] until deleted or swept
//! after expiring.

pub mod enumerator;
pub mod error;
pub mod manager;
pub mod queue;
pub mod record;
pub mod store;
pub mod view;

pub use enumerator::{Enumerator, ListingContext, Progress, ProgressReporter};
pub use error::ListingError;
pub use manager::ListingRequestManager;
pub use queue::{QueueEnumerator, QueueItemSummary};
pub use record::{JobRecord, ListingState};
pub use store::JobStore;
pub use view::ListingRequestView;

pub use qlist_core::{JobId, ListingConfig};
