//! Live notification events.
//!
//! Events are pushed to the uploading user over the live-update connection
//! and serialise to the compact envelope `{"t": type, "s": subject, "d": data}`.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::JobId;

/// Event types understood by the web client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Sent once when a subscription opens
    Welcome,
    /// A worker started on the job
    VideoProcessingBegin,
    /// Encode progress, data is the percentage as text
    VideoProcessingProgress,
    /// Job finished, data is the creation timestamp
    VideoProcessingComplete,
    /// Job failed, data carries the message and tool output
    VideoProcessingError,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Welcome => "WELCOME",
            EventType::VideoProcessingBegin => "VIDEO_PROCESSING_BEGIN",
            EventType::VideoProcessingProgress => "VIDEO_PROCESSING_PROGRESS",
            EventType::VideoProcessingComplete => "VIDEO_PROCESSING_COMPLETE",
            EventType::VideoProcessingError => "VIDEO_PROCESSING_ERROR",
        }
    }
}

/// Event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    /// Event type
    #[serde(rename = "t")]
    pub kind: EventType,
    /// Relevant job or user ID
    #[serde(rename = "s")]
    pub subject: String,
    /// Event payload
    #[serde(rename = "d")]
    pub data: Value,
}

impl Event {
    /// Create an event from its parts.
    pub fn new(kind: EventType, subject: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            subject: subject.into(),
            data,
        }
    }

    /// Create the greeting sent on subscribe.
    pub fn welcome() -> Self {
        Self::new(EventType::Welcome, "", Value::String(String::new()))
    }

    /// Create a processing-begin event.
    pub fn begin(job_id: &JobId) -> Self {
        Self::new(
            EventType::VideoProcessingBegin,
            job_id.as_str(),
            Value::String(String::new()),
        )
    }

    /// Create a progress event (0-100).
    pub fn progress(job_id: &JobId, percent: u8) -> Self {
        Self::new(
            EventType::VideoProcessingProgress,
            job_id.as_str(),
            Value::String(percent.min(100).to_string()),
        )
    }

    /// Create a completion event carrying the job creation time.
    pub fn complete(job_id: &JobId, created_at: DateTime<Utc>) -> Self {
        Self::new(
            EventType::VideoProcessingComplete,
            job_id.as_str(),
            Value::String(created_at.to_rfc3339()),
        )
    }

    /// Create an error event with a short message and the tool output.
    pub fn error(job_id: &JobId, message: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(
            EventType::VideoProcessingError,
            job_id.as_str(),
            serde_json::json!({
                "message": message.into(),
                "output": output.into(),
            }),
        )
    }

    #[cfg(test)]
    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
