//! Worker error types.

use thiserror::Error;

use shareclip_media::MediaError;
use shareclip_queue::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Upper bound on tool output carried in an ERROR event.
pub const MAX_ERROR_OUTPUT: usize = 4 * 1024;

/// Failures of the worker process itself.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

/// Failure of one job's pipeline.
///
/// Every variant except [`PipelineError::Cancelled`] ends the job in ERROR.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cannot create output directory: {0}")]
    CreateOutput(#[source] std::io::Error),

    #[error("Cannot mark job as processing: {0}")]
    MarkProcessing(#[source] StoreError),

    #[error("Probe failed: {0}")]
    Probe(#[source] MediaError),

    #[error("Malformed probe output: {0}")]
    MalformedProbe(String),

    #[error("No video streams present")]
    NoVideoStream,

    #[error("Encode failed: {0}")]
    Encode(#[source] MediaError),

    #[error("Thumbnail failed: {0}")]
    Thumbnail(#[source] MediaError),

    #[error("Cannot mark job as finished: {0}")]
    Finalize(#[source] StoreError),

    #[error("Interrupted by shutdown")]
    Cancelled,
}

impl PipelineError {
    /// Classify a probe failure.
    pub fn from_probe(err: MediaError) -> Self {
        match err {
            MediaError::Cancelled => Self::Cancelled,
            MediaError::JsonParse(e) => Self::MalformedProbe(e.to_string()),
            other => Self::Probe(other),
        }
    }

    /// Classify an encode failure.
    pub fn from_encode(err: MediaError) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Encode(err)
        }
    }

    /// Classify a thumbnail failure.
    pub fn from_thumbnail(err: MediaError) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Thumbnail(err)
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }

    /// Short message shown to the job owner.
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::CreateOutput(_) => "Cannot Create Output Directory",
            PipelineError::MarkProcessing(_) => "Cannot Mark Video as Processing",
            PipelineError::Probe(_) => "Probe Error",
            PipelineError::MalformedProbe(_) => "Invalid or Malformed Probe Output",
            PipelineError::NoVideoStream => "No Video Streams Present",
            PipelineError::Encode(_) => "Encoding Error",
            PipelineError::Thumbnail(_) => "Thumbnail Error",
            PipelineError::Finalize(_) => "Database Error",
            PipelineError::Cancelled => "Cancelled",
        }
    }

    /// Diagnostic output, at most [`MAX_ERROR_OUTPUT`] bytes.
    pub fn output(&self) -> String {
        let full = match self {
            PipelineError::Probe(e) | PipelineError::Encode(e) | PipelineError::Thumbnail(e) => {
                e.diagnostic()
            }
            PipelineError::CreateOutput(e) => e.to_string(),
            PipelineError::MarkProcessing(e) | PipelineError::Finalize(e) => e.to_string(),
            PipelineError::MalformedProbe(detail) => detail.clone(),
            PipelineError::NoVideoStream | PipelineError::Cancelled => String::new(),
        };
        truncate_output(full, MAX_ERROR_OUTPUT)
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::CreateOutput(_) => "create_output",
            PipelineError::MarkProcessing(_) => "mark_processing",
            PipelineError::Probe(_) => "probe",
            PipelineError::MalformedProbe(_) => "malformed_probe",
            PipelineError::NoVideoStream => "no_video_stream",
            PipelineError::Encode(_) => "encode",
            PipelineError::Thumbnail(_) => "thumbnail",
            PipelineError::Finalize(_) => "finalize",
            PipelineError::Cancelled => "cancelled",
        }
    }
}

/// Cut `text` to at most `max` bytes on a char boundary.
fn truncate_output(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}
