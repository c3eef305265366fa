//! Streaming-format encode.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::command::FfmpegCommand;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Hardware codecs tried before falling back to the software codec
pub const DEFAULT_HARDWARE_CODECS: &str = "h264_nvenc,h264_qsv,h264_amf";
/// Default pixel format
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "fast";
/// Default constant quantizer
pub const DEFAULT_QUALITY: &str = "27";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "320K";
/// Default audio channel count
pub const DEFAULT_AUDIO_CHANNELS: &str = "2";

/// Encoder settings shared by every job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeProfile {
    /// Pixel format (e.g., "yuv420p")
    pub pixel_format: String,
    /// Encoding preset (e.g., "fast", "medium", "slow")
    pub preset: String,
    /// Constant quantizer passed as `-qp`
    pub quality: String,
    /// Audio codec
    pub audio_codec: String,
    /// Audio bitrate
    pub audio_bitrate: String,
    /// Output audio channel count
    pub audio_channels: String,
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self {
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            quality: DEFAULT_QUALITY.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            audio_channels: DEFAULT_AUDIO_CHANNELS.to_string(),
        }
    }
}

/// Per-job encode parameters derived from the probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Output height in pixels, width follows the aspect ratio
    pub height: u32,
    /// Output frame rate
    pub framerate: u32,
    /// Number of audio streams to merge into the output track
    pub audio_streams: u32,
}

impl EncodeRequest {
    /// Build the FFmpeg invocation for this request.
    pub fn to_command(&self, video_codec: &str, profile: &EncodeProfile) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(&self.input, &self.output)
            .with_progress()
            .video_codec(video_codec)
            .pixel_format(&profile.pixel_format)
            .preset(&profile.preset)
            .qp(&profile.quality)
            .video_filter(format!("scale=-2:{}", self.height))
            .framerate(self.framerate);

        if self.audio_streams == 0 {
            return cmd.no_audio();
        }

        cmd = cmd
            .audio_codec(&profile.audio_codec)
            .audio_bitrate(&profile.audio_bitrate)
            .audio_channels(&profile.audio_channels);

        if self.audio_streams > 1 {
            cmd = cmd.filter_complex(format!("amerge=inputs={}", self.audio_streams));
        }

        cmd
    }
}
