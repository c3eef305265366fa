//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};
use crate::lenient;

/// Kind of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    #[serde(other)]
    Unknown,
}

/// One stream as reported by `ffprobe -show_streams`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub codec_name: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(rename = "codec_type")]
    pub kind: StreamKind,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "lenient::u64_opt")]
    pub sample_rate: Option<u64>,
    #[serde(default)]
    pub channels: Option<u32>,
    #[serde(default)]
    pub channel_layout: Option<String>,
    /// Average frame rate in frames per second
    #[serde(default, rename = "avg_frame_rate", deserialize_with = "lenient::frame_rate_opt")]
    pub avg_frame_rate: Option<f64>,
    #[serde(default)]
    pub time_base: Option<String>,
    /// Duration in seconds
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient::u64_opt")]
    pub bit_rate: Option<u64>,
}

/// Container information as reported by `ffprobe -show_format`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeFormat {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, rename = "nb_streams", deserialize_with = "lenient::u64_opt")]
    pub stream_count: Option<u64>,
    /// Duration in seconds
    #[serde(default, deserialize_with = "lenient::f64_opt")]
    pub duration: Option<f64>,
    /// File size in bytes
    #[serde(default, deserialize_with = "lenient::u64_opt")]
    pub size: Option<u64>,
    /// Bitrate in bits/second
    #[serde(default, deserialize_with = "lenient::u64_opt")]
    pub bit_rate: Option<u64>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// FFprobe JSON output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: ProbeFormat,
}

impl ProbeReport {
    /// Parse the JSON printed by `ffprobe -print_format json`.
    pub fn from_json(bytes: &[u8]) -> MediaResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Streams of the given kind, in file order.
    pub fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &ProbeStream> {
        self.streams.iter().filter(move |s| s.kind == kind)
    }

    /// Container duration in whole milliseconds.
    ///
    /// Falls back to the longest stream when the container has no duration.
    pub fn duration_ms(&self) -> Option<i64> {
        let seconds = self.format.duration.or_else(|| {
            self.streams
                .iter()
                .filter_map(|s| s.duration)
                .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))))
        })?;
        Some((seconds * 1000.0).floor() as i64)
    }
}

/// Probe a media file for stream and container information.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<ProbeReport> {
    let path = path.as_ref();

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    debug!("Probing {}", path.display());
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams", "-i"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(MediaError::ffprobe_failed("FFprobe failed", Some(stderr)));
    }

    ProbeReport::from_json(&output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "h264",
                "profile": "High",
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "avg_frame_rate": "30000/1001",
                "time_base": "1/30000",
                "duration": "10.010000",
                "bit_rate": "4000000"
            },
            {
                "index": 1,
                "codec_name": "aac",
                "codec_type": "audio",
                "sample_rate": "48000",
                "channels": 2,
                "channel_layout": "stereo",
                "avg_frame_rate": "0/0",
                "duration": "10.005333"
            },
            {
                "index": 2,
                "codec_type": "data",
                "avg_frame_rate": "0/0"
            }
        ],
        "format": {
            "filename": "input",
            "nb_streams": 3,
            "duration": "10.010000",
            "size": "5242880",
            "bit_rate": "4190000",
            "tags": {"major_brand": "isom"}
        }
    }"#;

    #[test]
    fn test_parse_report() {
        let report = ProbeReport::from_json(SAMPLE.as_bytes()).unwrap();

        assert_eq!(report.streams.len(), 3);
        assert_eq!(report.streams_of(StreamKind::Video).count(), 1);
        assert_eq!(report.streams_of(StreamKind::Audio).count(), 1);

        let video = report.streams_of(StreamKind::Video).next().unwrap();
        assert_eq!(video.height, Some(1080));
        assert!((video.avg_frame_rate.unwrap() - 29.97).abs() < 0.01);

        let audio = report.streams_of(StreamKind::Audio).next().unwrap();
        assert_eq!(audio.sample_rate, Some(48_000));
        assert_eq!(audio.avg_frame_rate, None);

        assert_eq!(report.format.stream_count, Some(3));
        assert_eq!(report.format.size, Some(5_242_880));
        assert_eq!(report.duration_ms(), Some(10_010));
    }

    #[test]
    fn test_unknown_stream_kind() {
        let report = ProbeReport::from_json(br#"{"streams": [{"codec_type": "hologram"}]}"#).unwrap();
        assert_eq!(report.streams[0].kind, StreamKind::Unknown);
        assert_eq!(report.duration_ms(), None);
    }

    #[test]
    fn test_duration_falls_back_to_streams() {
        let report = ProbeReport::from_json(
            br#"{"streams": [
                {"codec_type": "video", "duration": "4.5"},
                {"codec_type": "audio", "duration": "4.75"}
            ], "format": {"duration": "N/A"}}"#,
        )
        .unwrap();
        assert_eq!(report.duration_ms(), Some(4_750));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            ProbeReport::from_json(b"not json"),
            Err(MediaError::JsonParse(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let err = probe_media("/definitely/not/here.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
