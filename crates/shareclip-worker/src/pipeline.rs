//! Transcode pipeline for a single job.
//!
//! Stages run in order: prepare the output directory and mark the job
//! PROCESSING, probe the upload, encode with progress, extract the
//! thumbnail, then mark the job FINISHED. A failure in any stage marks the
//! job ERROR, removes the output directory and tells the owner why. When the
//! worker is shutting down the job is left PROCESSING for the next startup
//! to recover, and the owner is not told anything.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn, Instrument};

use shareclip_media::{EncodeRequest, ProbeReport, StreamKind, ThumbnailRequest, Transcoder};
use shareclip_models::{Event, Job, JobStatus};
use shareclip_queue::{EventBus, JobStore, StoreResult};

use crate::config::{EncoderSettings, WorkerConfig};
use crate::error::PipelineError;
use crate::logging::JobLogger;
use crate::metrics;
use crate::reporter::ProgressReporter;

/// How a job left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Finished,
    Failed,
    /// Interrupted by shutdown, still PROCESSING
    Cancelled,
}

/// Encode parameters derived from the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodePlan {
    pub height: u32,
    pub framerate: u32,
    pub audio_streams: u32,
    /// Source duration used for progress, zero when unknown
    pub duration_ms: i64,
}

impl EncodePlan {
    /// Derive the plan, capping geometry and audio to the configured limits.
    ///
    /// With several video streams the last one decides the geometry.
    pub fn from_probe(report: &ProbeReport, limits: &EncoderSettings) -> Result<Self, PipelineError> {
        let mut video_streams = 0;
        let mut height = limits.video_height_limit;
        let mut framerate = limits.video_fps_limit;

        for stream in report.streams_of(StreamKind::Video) {
            video_streams += 1;
            height = match stream.height {
                Some(h) if h > 0 => h.min(limits.video_height_limit),
                _ => limits.video_height_limit,
            };
            framerate = match stream.avg_frame_rate {
                Some(fps) if fps > 0.0 => (fps.round() as u32).clamp(1, limits.video_fps_limit),
                _ => limits.video_fps_limit,
            };
        }

        if video_streams == 0 {
            return Err(PipelineError::NoVideoStream);
        }

        let audio_streams = report
            .streams_of(StreamKind::Audio)
            .count()
            .min(limits.audio_streams_limit as usize) as u32;

        Ok(Self {
            height,
            framerate,
            audio_streams,
            duration_ms: report.duration_ms().unwrap_or(0).max(0),
        })
    }
}

/// File locations for one job.
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub video: PathBuf,
    pub thumbnail: PathBuf,
}

impl JobPaths {
    pub fn new(config: &WorkerConfig, job: &Job) -> Self {
        let output_dir = config.output_dir(&job.id);
        Self {
            input: config.input_path(&job.id),
            video: output_dir.join(&config.encoder.output_video_filename),
            thumbnail: output_dir.join(&config.encoder.output_thumbnail_filename),
            output_dir,
        }
    }
}

/// Runs claimed jobs to a terminal state.
pub struct Pipeline {
    config: Arc<WorkerConfig>,
    store: Arc<dyn JobStore>,
    bus: Arc<EventBus>,
    transcoder: Arc<dyn Transcoder>,
}

impl Pipeline {
    pub fn new(
        config: Arc<WorkerConfig>,
        store: Arc<dyn JobStore>,
        bus: Arc<EventBus>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            config,
            store,
            bus,
            transcoder,
        }
    }

    /// Run `job` on worker `worker`. Never fails; errors end up on the job.
    pub async fn run(&self, job: &Job, worker: usize) -> JobOutcome {
        let logger = JobLogger::new(&job.id, worker);
        let span = logger.create_span();
        self.run_logged(job, &logger).instrument(span).await
    }

    async fn run_logged(&self, job: &Job, logger: &JobLogger) -> JobOutcome {
        let paths = JobPaths::new(&self.config, job);
        logger.log_start(&format!("owner {}", job.owner_id));

        match self.process(job, &paths, logger).await {
            Ok(()) => {
                metrics::record_job_completed();
                logger.log_completion("video and thumbnail published");
                JobOutcome::Finished
            }
            Err(PipelineError::Cancelled) => {
                logger.log_warning("interrupted by shutdown, left for recovery");
                remove_output(&paths.output_dir).await;
                JobOutcome::Cancelled
            }
            Err(err) => {
                self.fail(job, &paths, logger, err).await;
                JobOutcome::Failed
            }
        }
    }

    async fn process(&self, job: &Job, paths: &JobPaths, logger: &JobLogger) -> Result<(), PipelineError> {
        // Prepare
        tokio::fs::create_dir_all(&paths.output_dir)
            .await
            .map_err(PipelineError::CreateOutput)?;
        self.transition(job, job.status, JobStatus::Processing)
            .await
            .map_err(PipelineError::MarkProcessing)?;
        self.bus.publish(&job.owner_id, Event::begin(&job.id));

        // Probe
        logger.log_stage("probe", "Probing upload");
        let report = self
            .transcoder
            .probe(&paths.input)
            .await
            .map_err(PipelineError::from_probe)?;
        let plan = EncodePlan::from_probe(&report, &self.config.encoder)?;
        logger.log_stage(
            "encode",
            &format!(
                "Encoding at {}p{} with {} audio stream(s)",
                plan.height, plan.framerate, plan.audio_streams
            ),
        );

        // Encode
        let request = EncodeRequest {
            input: paths.input.clone(),
            output: paths.video.clone(),
            height: plan.height,
            framerate: plan.framerate,
            audio_streams: plan.audio_streams,
        };
        let reporter = ProgressReporter::new(
            Arc::clone(&self.bus),
            job.owner_id.clone(),
            job.id.clone(),
            plan.duration_ms,
        );
        self.transcoder
            .encode(&request, reporter.into_callback())
            .await
            .map_err(PipelineError::from_encode)?;

        // Thumbnail
        logger.log_stage("thumbnail", "Extracting thumbnail");
        let thumbnail = ThumbnailRequest {
            input: paths.input.clone(),
            output: paths.thumbnail.clone(),
            height: plan.height,
        };
        self.transcoder
            .thumbnail(&thumbnail)
            .await
            .map_err(PipelineError::from_thumbnail)?;

        // Complete
        self.transition(job, JobStatus::Processing, JobStatus::Finished)
            .await
            .map_err(PipelineError::Finalize)?;
        self.bus
            .publish(&job.owner_id, Event::complete(&job.id, job.created_at));

        Ok(())
    }

    /// Write `to` for a job this worker owns, currently in `from`.
    async fn transition(&self, job: &Job, from: JobStatus, to: JobStatus) -> StoreResult<()> {
        debug_assert!(
            from.can_transition_to(to),
            "job {} cannot move from {} to {}",
            job.id,
            from,
            to
        );
        self.store.set_status(&job.id, to).await
    }

    async fn fail(&self, job: &Job, paths: &JobPaths, logger: &JobLogger, err: PipelineError) {
        logger.log_error(&err.to_string());
        metrics::record_job_failed(err.kind());

        if let Err(e) = self
            .transition(job, JobStatus::Processing, JobStatus::Error)
            .await
        {
            logger.log_warning(&format!("cannot mark job as failed: {}", e));
        }
        remove_output(&paths.output_dir).await;

        self.bus.publish(
            &job.owner_id,
            Event::error(&job.id, err.user_message(), err.output()),
        );
    }
}

/// Remove a job's output directory, ignoring one that does not exist.
async fn remove_output(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Removed output directory {}", dir.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove output directory {}: {}", dir.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(json: &str) -> ProbeReport {
        ProbeReport::from_json(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_plan_caps_geometry() {
        let report = report(
            r#"{"streams": [
                {"codec_type": "video", "height": 2160, "avg_frame_rate": "120/1"},
                {"codec_type": "audio"}
            ], "format": {"duration": "12.5"}}"#,
        );
        let plan = EncodePlan::from_probe(&report, &EncoderSettings::default()).unwrap();

        assert_eq!(
            plan,
            EncodePlan {
                height: 1080,
                framerate: 60,
                audio_streams: 1,
                duration_ms: 12_500,
            }
        );
    }

    #[test]
    fn test_plan_keeps_smaller_source() {
        let report = report(
            r#"{"streams": [
                {"codec_type": "video", "height": 480, "avg_frame_rate": "30000/1001"}
            ]}"#,
        );
        let plan = EncodePlan::from_probe(&report, &EncoderSettings::default()).unwrap();

        assert_eq!(plan.height, 480);
        assert_eq!(plan.framerate, 30);
        assert_eq!(plan.audio_streams, 0);
        assert_eq!(plan.duration_ms, 0);
    }

    #[test]
    fn test_plan_missing_values_use_limits() {
        let report = report(r#"{"streams": [{"codec_type": "video", "avg_frame_rate": "0/0"}]}"#);
        let plan = EncodePlan::from_probe(&report, &EncoderSettings::default()).unwrap();

        assert_eq!(plan.height, 1080);
        assert_eq!(plan.framerate, 60);
    }

    #[test]
    fn test_plan_counts_audio_up_to_limit() {
        let mut streams = vec![r#"{"codec_type": "video", "height": 720}"#.to_string()];
        streams.extend((0..8).map(|_| r#"{"codec_type": "audio"}"#.to_string()));
        let report = report(&format!(r#"{{"streams": [{}]}}"#, streams.join(",")));

        let plan = EncodePlan::from_probe(&report, &EncoderSettings::default()).unwrap();
        assert_eq!(plan.audio_streams, 6);
    }

    #[test]
    fn test_plan_last_video_stream_wins() {
        let report = report(
            r#"{"streams": [
                {"codec_type": "video", "height": 720, "avg_frame_rate": "24/1"},
                {"codec_type": "video", "height": 360, "avg_frame_rate": "25/1"}
            ]}"#,
        );
        let plan = EncodePlan::from_probe(&report, &EncoderSettings::default()).unwrap();
        assert_eq!((plan.height, plan.framerate), (360, 25));
    }

    #[test]
    fn test_plan_without_video_fails() {
        let report = report(r#"{"streams": [{"codec_type": "audio"}]}"#);
        assert!(matches!(
            EncodePlan::from_probe(&report, &EncoderSettings::default()),
            Err(PipelineError::NoVideoStream)
        ));
    }

    #[test]
    fn test_job_paths() {
        let config = WorkerConfig::with_data_dir("/data");
        let job = Job::queued("abc".into(), "u");
        let paths = JobPaths::new(&config, &job);

        assert_eq!(paths.input, PathBuf::from("/data/video/abc"));
        assert_eq!(paths.output_dir, PathBuf::from("/data/public/abc"));
        assert_eq!(paths.video, PathBuf::from("/data/public/abc/video.mp4"));
        assert_eq!(paths.thumbnail, PathBuf::from("/data/public/abc/preview.webp"));
    }
}
