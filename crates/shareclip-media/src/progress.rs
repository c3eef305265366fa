//! FFmpeg progress parsing.
//!
//! With `-progress pipe:1` FFmpeg writes blocks of `key=value` lines to
//! stdout. Every block ends with a `progress=continue` or `progress=end`
//! line.

use serde::{Deserialize, Serialize};

/// State reported by the terminating `progress=` line of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    /// More blocks will follow
    #[default]
    Continue,
    /// Final block, encoding is done
    End,
    /// Terminator value we do not recognise
    Unknown,
}

/// One progress block from FFmpeg.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in microseconds, `None` when absent or not a number
    pub out_time_us: Option<i64>,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// How the block was terminated
    pub state: ProgressState,
}

impl FfmpegProgress {
    /// Whether this is the final block.
    pub fn is_complete(&self) -> bool {
        self.state == ProgressState::End
    }

    /// Output time in milliseconds.
    pub fn out_time_ms(&self) -> Option<i64> {
        self.out_time_us.map(|us| us / 1000)
    }

    /// Progress as a whole percentage of `total_duration_ms`.
    ///
    /// Returns `None` when the block carries no usable time or the total is
    /// not positive. The result is clamped to `0..=100`.
    pub fn percentage(&self, total_duration_ms: i64) -> Option<u8> {
        if total_duration_ms <= 0 {
            return None;
        }
        let elapsed_ms = self.out_time_us? as f64 / 1000.0;
        let percent = (elapsed_ms / total_duration_ms as f64) * 100.0;
        if !percent.is_finite() {
            return None;
        }
        Some(percent.clamp(0.0, 100.0).round() as u8)
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn FnMut(FfmpegProgress) + Send + 'static>;

/// Incremental parser that turns `key=value` lines into progress blocks.
#[derive(Debug, Default)]
pub struct ProgressParser {
    current: FfmpegProgress,
}

impl ProgressParser {
    /// Create a parser with an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line. Returns the finished block when `line` terminates it.
    pub fn feed(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();

        match key.trim() {
            "out_time_us" => {
                self.current.out_time_us = value.parse::<i64>().ok();
            }
            // Older FFmpeg builds report microseconds under this key too
            "out_time_ms" => {
                if self.current.out_time_us.is_none() {
                    self.current.out_time_us = value.parse::<i64>().ok();
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.current.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    self.current.fps = fps;
                }
            }
            "speed" => {
                // Format: "1.5x" or "N/A"
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.current.speed = speed;
                }
            }
            "progress" => {
                self.current.state = match value {
                    "continue" => ProgressState::Continue,
                    "end" => ProgressState::End,
                    _ => ProgressState::Unknown,
                };
                return Some(std::mem::take(&mut self.current));
            }
            _ => {}
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut ProgressParser, text: &str) -> Vec<FfmpegProgress> {
        text.lines().filter_map(|line| parser.feed(line)).collect()
    }

    #[test]
    fn test_blocks_are_split_on_progress_key() {
        let mut parser = ProgressParser::new();
        let blocks = feed_all(
            &mut parser,
            "frame=10\nfps=25.0\nout_time_us=400000\nspeed=1.5x\nprogress=continue\n\
             frame=20\nout_time_us=800000\nspeed=N/A\nprogress=end\n",
        );

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].frame, 10);
        assert_eq!(blocks[0].out_time_us, Some(400_000));
        assert!((blocks[0].speed - 1.5).abs() < 0.01);
        assert_eq!(blocks[0].state, ProgressState::Continue);

        assert_eq!(blocks[1].frame, 20);
        assert_eq!(blocks[1].out_time_ms(), Some(800));
        assert!(blocks[1].is_complete());
    }

    #[test]
    fn test_block_without_time_has_no_percentage() {
        let mut parser = ProgressParser::new();
        let blocks = feed_all(&mut parser, "out_time_us=N/A\nprogress=continue\n");

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].out_time_us, None);
        assert_eq!(blocks[0].percentage(10_000), None);
    }

    #[test]
    fn test_values_do_not_leak_between_blocks() {
        let mut parser = ProgressParser::new();
        let blocks = feed_all(
            &mut parser,
            "out_time_us=5000000\nprogress=continue\nprogress=continue\n",
        );

        assert_eq!(blocks[0].out_time_us, Some(5_000_000));
        assert_eq!(blocks[1].out_time_us, None);
    }

    #[test]
    fn test_unknown_terminator() {
        let mut parser = ProgressParser::new();
        let blocks = feed_all(&mut parser, "garbage line\nprogress=paused\n");
        assert_eq!(blocks[0].state, ProgressState::Unknown);
    }

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_us: Some(5_000_000),
            ..Default::default()
        };

        assert_eq!(progress.percentage(10_000), Some(50));
        assert_eq!(progress.percentage(5_000), Some(100));
        assert_eq!(progress.percentage(2_500), Some(100));
        assert_eq!(progress.percentage(0), None);
    }

    #[test]
    fn test_percentage_rounds_and_clamps_negative_time() {
        let progress = FfmpegProgress {
            out_time_us: Some(3_336_000),
            ..Default::default()
        };
        assert_eq!(progress.percentage(10_000), Some(33));

        let progress = FfmpegProgress {
            out_time_us: Some(-23_000),
            ..Default::default()
        };
        assert_eq!(progress.percentage(10_000), Some(0));
    }
}
