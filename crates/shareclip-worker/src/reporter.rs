//! Progress reporting for a running encode.
//!
//! Converts FFmpeg progress blocks into PROGRESS events for the job owner.
//! Values only move forward, blocks without a usable timestamp are skipped
//! and nothing is reported after the final block.

use std::sync::Arc;

use tracing::trace;

use shareclip_media::{FfmpegProgress, ProgressCallback};
use shareclip_models::{Event, JobId};
use shareclip_queue::EventBus;

pub struct ProgressReporter {
    bus: Arc<EventBus>,
    owner_id: String,
    job_id: JobId,
    duration_ms: i64,
    last: Option<u8>,
    finished: bool,
}

impl ProgressReporter {
    /// Report against a probed duration; a zero or negative duration disables reporting.
    pub fn new(bus: Arc<EventBus>, owner_id: impl Into<String>, job_id: JobId, duration_ms: i64) -> Self {
        Self {
            bus,
            owner_id: owner_id.into(),
            job_id,
            duration_ms,
            last: None,
            finished: false,
        }
    }

    /// Handle one progress block.
    pub fn observe(&mut self, progress: &FfmpegProgress) {
        if self.finished {
            return;
        }
        if progress.is_complete() {
            self.finished = true;
            return;
        }

        let Some(percent) = progress.percentage(self.duration_ms) else {
            trace!(job_id = %self.job_id, "Skipping progress block without timestamp");
            return;
        };

        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        self.bus
            .publish(&self.owner_id, Event::progress(&self.job_id, percent));
    }

    /// Last published percentage.
    pub fn last(&self) -> Option<u8> {
        self.last
    }

    /// Wrap the reporter in a callback for the encoder.
    pub fn into_callback(mut self) -> ProgressCallback {
        Box::new(move |progress| self.observe(&progress))
    }
}
