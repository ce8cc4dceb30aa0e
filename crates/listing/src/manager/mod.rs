//! Listing request manager -- job lifecycle and asynchronous enumeration.
//!
//! Split into focused submodules:
//! - `core`: Manager struct, constructor, and the submit/get/cancel/delete surface
//! - `execution`: the per-job task that drives an enumerator to a terminal state

mod core;
mod execution;

pub use self::core::ListingRequestManager;
