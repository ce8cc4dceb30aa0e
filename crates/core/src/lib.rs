pub mod clock;
pub mod config;
pub mod error;
pub mod id;

pub use clock::{Clock, SystemClock};
pub use config::{Config, ListingConfig};
pub use error::*;
pub use id::{IdGenerator, JobId, UuidGenerator};
