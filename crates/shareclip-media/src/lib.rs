#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the transcode pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:1`
//! - Cancellation support via tokio
//! - FFprobe metadata with lenient numeric decoding
//! - Encode, thumbnail and hardware codec selection
//! - The [`Transcoder`] capability used by workers

pub mod command;
pub mod encode;
pub mod encoder;
pub mod error;
pub mod lenient;
pub mod probe;
pub mod progress;
pub mod thumbnail;
pub mod transcoder;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use encode::{EncodeProfile, EncodeRequest};
pub use encoder::{select_video_codec, CodecPreference};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_media, ProbeFormat, ProbeReport, ProbeStream, StreamKind};
pub use progress::{FfmpegProgress, ProgressCallback, ProgressParser, ProgressState};
pub use thumbnail::{generate_thumbnail, ThumbnailRequest};
pub use transcoder::{FfmpegTranscoder, Transcoder};
