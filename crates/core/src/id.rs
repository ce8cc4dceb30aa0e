//! Job identifiers and their generator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdError;

/// Opaque, immutable identifier of a listing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| IdError::Malformed(s.to_string()))
    }
}

/// Allocates fresh job ids.
///
/// Uniqueness is checked by the store; a generator that keeps returning
/// ids already in use is treated as an exhausted id space.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> JobId;
}

/// Random UUID v4 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> JobId {
        JobId(Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_display_parse() {
        let id = UuidGenerator.next_id();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_job_id_rejects_garbage() {
        let err = "not-a-uuid".parse::<JobId>().unwrap_err();
        assert_eq!(err, IdError::Malformed("not-a-uuid".to_string()));
    }

    #[test]
    fn test_job_id_serializes_as_plain_string() {
        let id = JobId::from_uuid(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }

    #[test]
    fn test_uuid_generator_unique() {
        let a = UuidGenerator.next_id();
        let b = UuidGenerator.next_id();
        assert_ne!(a, b);
    }
}
