//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use shareclip_media::encode::{
    DEFAULT_AUDIO_BITRATE, DEFAULT_AUDIO_CHANNELS, DEFAULT_AUDIO_CODEC, DEFAULT_HARDWARE_CODECS,
    DEFAULT_PIXEL_FORMAT, DEFAULT_PRESET, DEFAULT_QUALITY, DEFAULT_VIDEO_CODEC,
};
use shareclip_media::encoder::parse_codec_list;
use shareclip_media::{CodecPreference, EncodeProfile};
use shareclip_models::JobId;
use shareclip_queue::{DEFAULT_EVENT_BUFFER, DEFAULT_RECOVERY_CAPACITY};

/// Encoder and pipeline limits.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    /// Number of parallel workers
    pub workers: usize,
    /// Probe hardware encoders before falling back to the software codec
    pub use_hardware: bool,
    pub output_video_filename: String,
    pub output_thumbnail_filename: String,
    /// Upper bound on output height in pixels
    pub video_height_limit: u32,
    /// Upper bound on output frame rate
    pub video_fps_limit: u32,
    pub pixel_format: String,
    pub preset: String,
    pub quality: String,
    /// Software codec
    pub video_codec: String,
    /// Hardware codecs in order of preference
    pub hardware_codecs: Vec<String>,
    /// Audio streams merged into the output, extra streams are ignored
    pub audio_streams_limit: u32,
    pub audio_bitrate: String,
    pub audio_codec: String,
    pub audio_channels: String,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            use_hardware: true,
            output_video_filename: "video.mp4".to_string(),
            output_thumbnail_filename: "preview.webp".to_string(),
            video_height_limit: 1080,
            video_fps_limit: 60,
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            quality: DEFAULT_QUALITY.to_string(),
            video_codec: DEFAULT_VIDEO_CODEC.to_string(),
            hardware_codecs: parse_codec_list(DEFAULT_HARDWARE_CODECS),
            audio_streams_limit: 6,
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_channels: DEFAULT_AUDIO_CHANNELS.to_string(),
        }
    }
}

impl EncoderSettings {
    /// Create settings from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);

        Self {
            workers: parse_or(&lookup, "ENCODER_WORKERS", defaults.workers).max(1),
            use_hardware: lookup("ENCODER_USE_HARDWARE")
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.use_hardware),
            output_video_filename: string(
                "ENCODER_OUTPUT_FILENAME_VIDEO",
                defaults.output_video_filename,
            ),
            output_thumbnail_filename: string(
                "ENCODER_OUTPUT_FILENAME_THUMBNAIL",
                defaults.output_thumbnail_filename,
            ),
            video_height_limit: parse_or(&lookup, "ENCODER_VIDEO_HEIGHT_LIMIT", defaults.video_height_limit)
                .max(1),
            video_fps_limit: parse_or(&lookup, "ENCODER_VIDEO_FPS_LIMIT", defaults.video_fps_limit).max(1),
            pixel_format: string("ENCODER_VIDEO_PIXEL_FORMAT", defaults.pixel_format),
            preset: string("ENCODER_VIDEO_PRESET", defaults.preset),
            quality: string("ENCODER_VIDEO_QUALITY", defaults.quality),
            video_codec: string("ENCODER_VIDEO_CODEC", defaults.video_codec),
            hardware_codecs: lookup("ENCODER_VIDEO_HARDWARE_CODEC")
                .map(|s| parse_codec_list(&s))
                .unwrap_or(defaults.hardware_codecs),
            audio_streams_limit: parse_or(&lookup, "ENCODER_AUDIO_STREAMS_LIMIT", defaults.audio_streams_limit),
            audio_bitrate: string("ENCODER_AUDIO_BITRATE", defaults.audio_bitrate),
            audio_codec: string("ENCODER_AUDIO_CODEC", defaults.audio_codec),
            audio_channels: string("ENCODER_AUDIO_CHANNELS", defaults.audio_channels),
        }
    }

    /// Codecs the transcoder may pick from.
    pub fn codec_preference(&self) -> CodecPreference {
        CodecPreference {
            software: self.video_codec.clone(),
            hardware: self.hardware_codecs.clone(),
            use_hardware: self.use_hardware,
        }
    }

    /// Encoder flags shared by every job.
    pub fn encode_profile(&self) -> EncodeProfile {
        EncodeProfile {
            pixel_format: self.pixel_format.clone(),
            preset: self.preset.clone(),
            quality: self.quality.clone(),
            audio_codec: self.audio_codec.clone(),
            audio_bitrate: self.audio_bitrate.clone(),
            audio_channels: self.audio_channels.clone(),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root data directory holding `video/` uploads and `public/` outputs
    pub data_dir: PathBuf,
    /// Job store location
    pub database_url: String,
    pub encoder: EncoderSettings,
    /// Delay before retrying after a job store failure
    pub store_retry_delay: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Initial recovery queue capacity and growth step
    pub recovery_capacity: usize,
    /// Per-subscription event buffer
    pub event_buffer: usize,
    /// Prometheus exporter listen address
    pub metrics_addr: Option<SocketAddr>,
    /// How often the binary checks for rows queued by another process
    pub queue_poll_interval: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::with_data_dir("data")
    }
}

impl WorkerConfig {
    /// Default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            database_url: default_database_url(&data_dir),
            data_dir,
            encoder: EncoderSettings::default(),
            store_retry_delay: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(60),
            recovery_capacity: DEFAULT_RECOVERY_CAPACITY,
            event_buffer: DEFAULT_EVENT_BUFFER,
            metrics_addr: None,
            queue_poll_interval: Some(Duration::from_secs(5)),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = PathBuf::from(lookup("DATA").unwrap_or_else(|| "data".to_string()));
        let defaults = Self::with_data_dir(&data_dir);

        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            data_dir,
            encoder: EncoderSettings::from_lookup(&lookup),
            store_retry_delay: Duration::from_secs(parse_or(&lookup, "WORKER_STORE_RETRY_SECS", 1)),
            shutdown_timeout: Duration::from_secs(parse_or(&lookup, "WORKER_SHUTDOWN_TIMEOUT", 60)),
            recovery_capacity: parse_or(&lookup, "RECOVERY_QUEUE_CAPACITY", defaults.recovery_capacity),
            event_buffer: parse_or(&lookup, "EVENT_BUFFER_SIZE", defaults.event_buffer),
            metrics_addr: lookup("METRICS_ADDR").and_then(|s| s.parse().ok()),
            // Zero disables polling
            queue_poll_interval: match parse_or(&lookup, "WORKER_QUEUE_POLL_SECS", 5u64) {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    /// Directory uploads are written to.
    pub fn input_dir(&self) -> PathBuf {
        self.data_dir.join("video")
    }

    /// Directory per-job outputs are published under.
    pub fn output_root(&self) -> PathBuf {
        self.data_dir.join("public")
    }

    /// Uploaded source file for a job.
    pub fn input_path(&self, id: &JobId) -> PathBuf {
        self.input_dir().join(id.as_str())
    }

    /// Output directory for a job.
    pub fn output_dir(&self, id: &JobId) -> PathBuf {
        self.output_root().join(id.as_str())
    }
}

fn default_database_url(data_dir: &std::path::Path) -> String {
    format!("sqlite://{}", data_dir.join("database.db").display())
}

fn parse_or<T: FromStr>(lookup: impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key).and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

/// Parse the boolean spellings accepted in environment files.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
