//! Job definitions.

use chrono::{DateTime, Utc};
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::JobStatus;

/// Characters a job identifier is drawn from.
pub const JOB_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Number of characters in a job identifier.
pub const JOB_ID_LENGTH: usize = 11;

/// Unique identifier for a job.
///
/// Identifiers are YouTube-style: 11 characters from a 62 character
/// alphabet, which gives roughly 65 bits of entropy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id = (0..JOB_ID_LENGTH)
            .map(|_| JOB_ID_ALPHABET[rng.random_range(0..JOB_ID_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier has the generated shape.
    ///
    /// Collaborators use this to reject path parameters before touching the store.
    pub fn is_valid(&self) -> bool {
        self.0.len() == JOB_ID_LENGTH && self.0.bytes().all(|b| JOB_ID_ALPHABET.contains(&b))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A transcode job as persisted in the job store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,
    /// User who uploaded the video
    pub owner_id: String,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// Current status
    pub status: JobStatus,
}

impl Job {
    /// Create a freshly queued job.
    pub fn queued(id: JobId, owner_id: impl Into<String>) -> Self {
        Self {
            id,
            owner_id: owner_id.into(),
            created_at: Utc::now(),
            status: JobStatus::Queued,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_id_shape() {
        for _ in 0..1_000 {
            let id = JobId::generate();
            assert_eq!(id.as_str().len(), JOB_ID_LENGTH);
            assert!(id.is_valid(), "unexpected character in {}", id);
        }
    }

    #[test]
    fn test_generated_ids_do_not_collide() {
        let ids: HashSet<JobId> = (0..100_000).map(|_| JobId::generate()).collect();
        assert_eq!(ids.len(), 100_000);
    }

    #[test]
    fn test_id_validation() {
        assert!(JobId::from("dQw4w9WgXcQ").is_valid());
        assert!(!JobId::from("short").is_valid());
        assert!(!JobId::from("dQw4w9WgXc-").is_valid());
        assert!(!JobId::from("dQw4w9WgXcQQ").is_valid());
    }

    #[test]
    fn test_job_serialization() {
        let job = Job::queued(JobId::from("abcdefghijk"), "user-1");
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["id"], "abcdefghijk");
        assert_eq!(json["owner_id"], "user-1");
        assert_eq!(json["status"], "QUEUED");
        assert!(!job.is_terminal());
    }
}
