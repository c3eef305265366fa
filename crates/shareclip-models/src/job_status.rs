//! Job status state machine.
//!
//! Statuses only ever move forward:
//! `QUEUED -> PROCESSING -> FINISHED | ERROR`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Uploaded and waiting for a worker
    #[default]
    Queued,
    /// Claimed by a worker
    Processing,
    /// Transcoded successfully
    Finished,
    /// Failed, must be re-submitted
    Error,
}

/// Returned when a stored status string is not recognised.
#[derive(Debug, Error)]
#[error("Unknown job status: {0}")]
pub struct ParseJobStatusError(pub String);

impl JobStatus {
    /// Get string representation of the status, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Finished => "FINISHED",
            JobStatus::Error => "ERROR",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Error)
    }

    /// Whether moving from `self` to `next` respects the state machine.
    ///
    /// `PROCESSING -> PROCESSING` is allowed: a recovered job is re-marked
    /// when its pipeline restarts.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Finished)
                | (JobStatus::Processing, JobStatus::Error)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ParseJobStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(JobStatus::Queued),
            "PROCESSING" => Ok(JobStatus::Processing),
            "FINISHED" => Ok(JobStatus::Finished),
            "ERROR" => Ok(JobStatus::Error),
            other => Err(ParseJobStatusError(other.to_string())),
        }
    }
}
