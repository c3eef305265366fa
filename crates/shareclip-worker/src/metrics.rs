//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_ENQUEUED_TOTAL: &str = "shareclip_jobs_enqueued_total";
    pub const JOBS_CLAIMED_TOTAL: &str = "shareclip_jobs_claimed_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "shareclip_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "shareclip_jobs_failed_total";
    pub const JOBS_RECOVERED_TOTAL: &str = "shareclip_jobs_recovered_total";
}

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

/// Record a job inserted by the ingestion path.
pub fn record_job_enqueued() {
    counter!(names::JOBS_ENQUEUED_TOTAL).increment(1);
}

/// Record a job taken by a worker, from the queue or the recovery queue.
pub fn record_job_claimed(source: &'static str) {
    counter!(names::JOBS_CLAIMED_TOTAL, "source" => source).increment(1);
}

/// Record a job reaching FINISHED.
pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

/// Record a job reaching ERROR.
pub fn record_job_failed(reason: &'static str) {
    counter!(names::JOBS_FAILED_TOTAL, "reason" => reason).increment(1);
}

/// Record the startup recovery scan.
pub fn record_jobs_recovered(count: usize) {
    counter!(names::JOBS_RECOVERED_TOTAL).increment(count as u64);
}
