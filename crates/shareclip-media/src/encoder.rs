//! Video codec selection.
//!
//! Hardware encoders are tried by encoding one black frame into the null
//! muxer; the first codec that succeeds is used for every job in the
//! process. Without a working hardware encoder the software codec is used.

use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::encode::{DEFAULT_HARDWARE_CODECS, DEFAULT_VIDEO_CODEC};

/// Test pattern used to exercise an encoder.
const TEST_PATTERN: &str = "color=black:s=1080x1080";

/// Which video codecs to consider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecPreference {
    /// Software codec, always available
    pub software: String,
    /// Hardware codecs in order of preference
    pub hardware: Vec<String>,
    /// Whether to try hardware codecs at all
    pub use_hardware: bool,
}

impl Default for CodecPreference {
    fn default() -> Self {
        Self {
            software: DEFAULT_VIDEO_CODEC.to_string(),
            hardware: parse_codec_list(DEFAULT_HARDWARE_CODECS),
            use_hardware: true,
        }
    }
}

/// Split a comma separated codec list, ignoring blanks.
pub fn parse_codec_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Command that encodes a single test frame with `codec`.
pub fn codec_test_command(codec: &str) -> FfmpegCommand {
    FfmpegCommand::new(TEST_PATTERN, "-")
        .input_args(["-f", "lavfi"])
        .output_args(["-an", "-sn", "-vframes", "1"])
        .video_codec(codec)
        .output_args(["-f", "null"])
}

/// Pick the video codec for this process.
pub async fn select_video_codec(preference: &CodecPreference) -> String {
    if preference.use_hardware {
        let runner = FfmpegRunner::new().with_timeout(30);
        for codec in &preference.hardware {
            match runner.run(&codec_test_command(codec)).await {
                Ok(()) => {
                    info!("Using hardware video codec: {}", codec);
                    return codec.clone();
                }
                Err(e) => debug!("Hardware codec {} unavailable: {}", codec, e),
            }
        }
    }

    info!("Using video codec: {}", preference.software);
    preference.software.clone()
}
