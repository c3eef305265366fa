//! Thumbnail generation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Extract one scaled frame as a still image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailRequest {
    pub input: PathBuf,
    /// Image path; the extension picks the format (e.g. `.webp`)
    pub output: PathBuf,
    /// Image height in pixels
    pub height: u32,
}

impl ThumbnailRequest {
    /// Build the FFmpeg invocation for this request.
    pub fn to_command(&self) -> FfmpegCommand {
        FfmpegCommand::new(&self.input, &self.output)
            .video_filter(format!("scale=-2:{}", self.height))
            .single_frame()
            .log_level("error")
    }
}

/// Generate a thumbnail from a video file.
pub async fn generate_thumbnail(runner: &FfmpegRunner, request: &ThumbnailRequest) -> MediaResult<()> {
    runner.run(&request.to_command()).await
}
