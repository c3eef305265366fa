//! Structured job logging utilities.
//!
//! Every line carries the job ID, the owning worker and the pipeline stage
//! so a single job can be followed through interleaved worker output.

use tracing::{error, info, warn, Span};

use shareclip_models::JobId;

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: JobId,
    worker: usize,
}

impl JobLogger {
    /// Create a logger for `job_id` running on worker `worker`.
    pub fn new(job_id: &JobId, worker: usize) -> Self {
        Self {
            job_id: job_id.clone(),
            worker,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, worker = self.worker, "Job started: {}", message);
    }

    /// Log entry into a pipeline stage.
    pub fn log_stage(&self, stage: &str, message: &str) {
        info!(
            job_id = %self.job_id,
            worker = self.worker,
            operation = stage,
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, worker = self.worker, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, worker = self.worker, "Job failed: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, worker = self.worker, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Span wrapping the whole pipeline for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, worker = self.worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::generate();
        let logger = JobLogger::new(&job_id, 3);

        assert_eq!(logger.job_id(), &job_id);
        assert_eq!(logger.worker, 3);
    }
}
