//! Shared data models for the ShareClip transcode core.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job identifiers and the job status state machine
//! - Live notification events pushed to connected users

pub mod event;
pub mod job;
pub mod job_status;

// Re-export common types
pub use event::{Event, EventType};
pub use job::{Job, JobId, JOB_ID_ALPHABET, JOB_ID_LENGTH};
pub use job_status::{JobStatus, ParseJobStatusError};
