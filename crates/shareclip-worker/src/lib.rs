//! Transcode worker.
//!
//! This crate provides:
//! - Worker pool with dispatcher wake-ups and crash recovery
//! - The probe, encode and thumbnail pipeline
//! - Live progress reporting to the job owner
//! - The service handle used by the HTTP layer
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod reporter;
pub mod retry;
pub mod service;

pub use config::{EncoderSettings, WorkerConfig};
pub use error::{PipelineError, WorkerError, WorkerResult};
pub use executor::WorkerPool;
pub use logging::JobLogger;
pub use pipeline::{EncodePlan, JobOutcome, Pipeline};
pub use reporter::ProgressReporter;
pub use service::TranscodeService;
