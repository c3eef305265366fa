//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use metrics::histogram;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{FfmpegProgress, ProgressParser};

/// Upper bound on captured diagnostic output per process.
const MAX_CAPTURED_OUTPUT: usize = 64 * 1024;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path (or lavfi source)
    input: PathBuf,
    /// Output file path (`-` for null muxers)
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Whether to write `-progress pipe:1` blocks to stdout
    progress: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            progress: false,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Report machine-readable progress on stdout.
    pub fn with_progress(mut self) -> Self {
        self.progress = true;
        self
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set output pixel format.
    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(format)
    }

    /// Set constant quantizer (quality).
    pub fn qp(self, quality: impl Into<String>) -> Self {
        self.output_arg("-qp").output_arg(quality)
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set output frame rate.
    pub fn framerate(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Set audio channel count.
    pub fn audio_channels(self, channels: impl Into<String>) -> Self {
        self.output_arg("-ac").output_arg(channels)
    }

    /// Drop audio from the output.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Extract single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        // Overwrite flag
        if self.overwrite {
            args.push("-y".to_string());
        }

        // Log level
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stdout
        if self.progress {
            args.push("-progress".to_string());
            args.push("pipe:1".to_string());
        }

        // Input args
        args.extend(self.input_args.clone());

        // Input file
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        // Output args
        args.extend(self.output_args.clone());

        // Output file
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// How a child process finished.
enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut,
}

/// Runner for FFmpeg commands with progress tracking and cancellation.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cancellation signal. The process is killed once it reads `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command with progress callback.
    ///
    /// The callback runs on a separate task that reads stdout while the
    /// process is alive. Stderr is captured for the error diagnostic.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, mut progress_callback: F) -> MediaResult<()>
    where
        F: FnMut(FfmpegProgress) + Send + 'static,
    {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let started = Instant::now();
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;

        // Spawn progress parsing task
        let progress_handle = tokio::spawn(async move {
            let mut parser = ProgressParser::new();
            let mut reader = BufReader::new(stdout).lines();

            while let Ok(Some(line)) = reader.next_line().await {
                if let Some(progress) = parser.feed(&line) {
                    progress_callback(progress);
                }
            }
        });
        let stderr_handle = tokio::spawn(read_bounded(stderr));

        let result = match self.wait_for_completion(&mut child).await {
            Outcome::Exited(status) => status.map_err(MediaError::from),
            Outcome::Cancelled => {
                info!("FFmpeg cancelled, killing process");
                let _ = child.kill().await;
                Err(MediaError::Cancelled)
            }
            Outcome::TimedOut => {
                let secs = self.timeout_secs.unwrap_or_default();
                warn!("FFmpeg timed out after {} seconds, killing process", secs);
                let _ = child.kill().await;
                Err(MediaError::Timeout(secs))
            }
        };

        // Both readers finish once the pipes close
        let _ = progress_handle.await;
        let stderr = stderr_handle.await.unwrap_or_default();

        histogram!("shareclip_ffmpeg_duration_seconds").record(started.elapsed().as_secs_f64());

        let status = result?;
        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr),
                status.code(),
            ))
        }
    }

    /// Wait for child process with cancellation and timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> Outcome {
        let cancelled = wait_cancelled(self.cancel_rx.clone());
        let deadline = async {
            match self.timeout_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            _ = cancelled => Outcome::Cancelled,
            _ = deadline => Outcome::TimedOut,
        }
    }
}

/// Resolves once the cancel flag is raised; never resolves without one.
async fn wait_cancelled(cancel_rx: Option<watch::Receiver<bool>>) {
    match cancel_rx {
        Some(mut rx) => {
            if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                // Sender dropped without cancelling
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending().await,
    }
}

/// Read a pipe to the end, keeping at most [`MAX_CAPTURED_OUTPUT`] bytes.
pub(crate) async fn read_bounded<R>(pipe: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut limited = pipe.take(MAX_CAPTURED_OUTPUT as u64);
    let _ = limited.read_to_end(&mut captured).await;

    // Drain the rest so the child never blocks on a full pipe
    let mut rest = limited.into_inner();
    let _ = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await;

    String::from_utf8_lossy(&captured).trim().to_string()
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .video_codec("libx264")
            .pixel_format("yuv420p")
            .qp("27")
            .framerate(30);

        let args = cmd.build_args();
        assert_eq!(&args[..3], &["-y", "-v", "error"]);
        assert!(!args.contains(&"-progress".to_string()));
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-pix_fmt", "yuv420p"]));
        assert!(args.windows(2).any(|w| w == ["-qp", "27"]));
        assert!(args.windows(2).any(|w| w == ["-r", "30"]));
        assert_eq!(args.last().unwrap(), "output.mp4");
    }

    #[test]
    fn test_progress_goes_before_input() {
        let args = FfmpegCommand::new("in.mov", "out.mp4")
            .with_progress()
            .build_args();

        let progress = args.iter().position(|a| a == "-progress").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[progress + 1], "pipe:1");
        assert!(progress < input);
        assert_eq!(args[input + 1], "in.mov");
    }

    #[test]
    fn test_input_args_precede_input() {
        let args = FfmpegCommand::new("color=black:s=16x16", "-")
            .input_args(["-f", "lavfi"])
            .output_args(["-f", "null"])
            .build_args();

        let lavfi = args.iter().position(|a| a == "lavfi").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(lavfi < input);
        assert_eq!(args.last().unwrap(), "-");
    }

    #[tokio::test]
    async fn test_read_bounded_truncates() {
        let data = vec![b'a'; MAX_CAPTURED_OUTPUT + 100];
        let captured = read_bounded(&data[..]).await;
        assert_eq!(captured.len(), MAX_CAPTURED_OUTPUT);
    }

    #[tokio::test]
    async fn test_wait_cancelled_resolves_on_flag() {
        let (tx, rx) = watch::channel(false);
        let waiter = tokio::spawn(wait_cancelled(Some(rx)));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancellation not observed")
            .unwrap();
    }
}
