//! Transcoder capability.
//!
//! Workers talk to the external tools only through [`Transcoder`], so tests
//! can substitute a fake that never spawns a process.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::{watch, OnceCell};

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegRunner};
use crate::encode::{EncodeProfile, EncodeRequest};
use crate::encoder::{select_video_codec, CodecPreference};
use crate::error::MediaResult;
use crate::probe::{probe_media, ProbeReport};
use crate::progress::ProgressCallback;
use crate::thumbnail::{generate_thumbnail, ThumbnailRequest};

/// Probe, encode and thumbnail operations used by the pipeline.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// One-time setup before workers start.
    async fn prepare(&self) -> MediaResult<()> {
        Ok(())
    }

    /// Read stream and container metadata.
    async fn probe(&self, input: &Path) -> MediaResult<ProbeReport>;

    /// Encode to the streaming format, reporting progress blocks as they arrive.
    async fn encode(&self, request: &EncodeRequest, on_progress: ProgressCallback) -> MediaResult<()>;

    /// Extract a still frame.
    async fn thumbnail(&self, request: &ThumbnailRequest) -> MediaResult<()>;
}

/// [`Transcoder`] backed by the `ffmpeg` and `ffprobe` binaries.
pub struct FfmpegTranscoder {
    preference: CodecPreference,
    profile: EncodeProfile,
    video_codec: OnceCell<String>,
    runner: FfmpegRunner,
}

impl FfmpegTranscoder {
    /// Create a transcoder. `cancel_rx` kills running processes on shutdown.
    pub fn new(
        preference: CodecPreference,
        profile: EncodeProfile,
        cancel_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            preference,
            profile,
            video_codec: OnceCell::new(),
            runner: FfmpegRunner::new().with_cancel(cancel_rx),
        }
    }

    /// The selected video codec, resolved on first use.
    pub async fn video_codec(&self) -> &str {
        self.video_codec
            .get_or_init(|| select_video_codec(&self.preference))
            .await
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn prepare(&self) -> MediaResult<()> {
        check_ffmpeg()?;
        check_ffprobe()?;
        self.video_codec().await;
        Ok(())
    }

    async fn probe(&self, input: &Path) -> MediaResult<ProbeReport> {
        probe_media(input).await
    }

    async fn encode(&self, request: &EncodeRequest, on_progress: ProgressCallback) -> MediaResult<()> {
        let codec = self.video_codec().await;
        let cmd = request.to_command(codec, &self.profile);
        self.runner.run_with_progress(&cmd, on_progress).await
    }

    async fn thumbnail(&self, request: &ThumbnailRequest) -> MediaResult<()> {
        generate_thumbnail(&self.runner, request).await
    }
}
