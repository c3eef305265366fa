//! Store error types.

use thiserror::Error;

use shareclip_models::{JobId, ParseJobStatusError};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Malformed job row: {0}")]
    MalformedRow(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn malformed_row(msg: impl Into<String>) -> Self {
        Self::MalformedRow(msg.into())
    }
}

impl From<ParseJobStatusError> for StoreError {
    fn from(e: ParseJobStatusError) -> Self {
        Self::malformed_row(e.to_string())
    }
}
