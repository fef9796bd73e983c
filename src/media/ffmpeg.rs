//! FFmpeg-backed encoding engine.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::media::engine::{EncodeMode, EncodeTask, EncodingEngine, EngineError};

/// Stderr lines kept for the failure message.
const STDERR_TAIL: usize = 20;

#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegEngine {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Build the argument list for one invocation. `duration_us` places the
    /// seek point of a frame grab; without it the first frame is taken.
    pub fn build_args(task: &EncodeTask, duration_us: Option<i64>) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-nostats".to_string(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ];

        if let EncodeMode::Frame { seek_percent } = task.mode {
            if let Some(total) = duration_us.filter(|us| *us > 0) {
                let seek_seconds = total as f64 * f64::from(seek_percent) / 100.0 / 1_000_000.0;
                args.extend(["-ss".to_string(), format!("{:.3}", seek_seconds)]);
            }
            args.extend([
                "-i".to_string(),
                task.input.to_string_lossy().to_string(),
                "-frames:v".to_string(),
                "1".to_string(),
                "-s".to_string(),
                task.resolution.to_string(),
                "-q:v".to_string(),
                "2".to_string(),
                task.output.to_string_lossy().to_string(),
            ]);
            return args;
        }

        args.extend([
            "-i".to_string(),
            task.input.to_string_lossy().to_string(),
            "-c:v".to_string(),
            task.video_codec.clone(),
            "-s".to_string(),
            task.resolution.to_string(),
            "-b:v".to_string(),
            format!("{}k", task.video_bitrate_kbps),
        ]);

        if let Some(audio) = &task.audio {
            args.extend([
                "-c:a".to_string(),
                audio.codec.clone(),
                "-b:a".to_string(),
                format!("{}k", audio.bitrate_kbps),
            ]);
        }

        if let EncodeMode::Segmented {
            segment_seconds,
            segment_pattern,
        } = &task.mode
        {
            args.extend([
                "-hls_time".to_string(),
                segment_seconds.to_string(),
                "-hls_list_size".to_string(),
                "0".to_string(),
                "-f".to_string(),
                "hls".to_string(),
                "-hls_segment_filename".to_string(),
                segment_pattern.to_string_lossy().to_string(),
            ]);
        }

        args.push(task.output.to_string_lossy().to_string());
        args
    }

    /// Source duration in microseconds, if ffprobe can tell.
    async fn probe_duration_us(&self, input: &Path) -> Option<i64> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(input)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| warn!(error = %e, "ffprobe could not be started"))
            .ok()?;

        if !output.status.success() {
            return None;
        }

        parse_duration_us(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl EncodingEngine for FfmpegEngine {
    async fn execute(
        &self,
        task: &EncodeTask,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), EngineError> {
        let duration_us = self.probe_duration_us(&task.input).await;
        if duration_us.is_none() {
            warn!(
                input = %task.input.display(),
                "Unknown source duration, progress limited to completion"
            );
        }

        let args = Self::build_args(task, duration_us);
        debug!("Running FFmpeg: {} {}", self.ffmpeg_path, args.join(" "));

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::Spawn)?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Io(std::io::Error::other("stderr not captured")))?;

        let read_progress = async {
            let mut lines = BufReader::new(stderr).lines();
            let mut state = ProgressState::default();
            let mut tail: Vec<String> = Vec::new();

            while let Some(line) = lines.next_line().await? {
                match parse_progress_line(&line, &mut state) {
                    LineKind::Report => {
                        if let Some(fraction) = state.fraction(duration_us) {
                            on_progress(fraction);
                        }
                    }
                    LineKind::Field => {}
                    LineKind::Other => {
                        if tail.len() == STDERR_TAIL {
                            tail.remove(0);
                        }
                        tail.push(line);
                    }
                }
            }

            Ok::<_, std::io::Error>(tail)
        };

        let (tail, status) = tokio::join!(read_progress, child.wait());
        let tail = tail?;
        let status = status?;

        if status.success() {
            Ok(())
        } else {
            Err(EngineError::Exited {
                code: status.code(),
                stderr: tail.join("\n"),
            })
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct ProgressState {
    out_time_us: i64,
    finished: bool,
}

impl ProgressState {
    fn fraction(&self, duration_us: Option<i64>) -> Option<f64> {
        if self.finished {
            return Some(1.0);
        }
        match duration_us {
            Some(total) if total > 0 => {
                Some((self.out_time_us.max(0) as f64 / total as f64).clamp(0.0, 1.0))
            }
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LineKind {
    /// A `progress=` line closing one report block.
    Report,
    /// Some other `key=value` field of a report block.
    Field,
    /// Anything else, typically an error message.
    Other,
}

fn parse_progress_line(line: &str, state: &mut ProgressState) -> LineKind {
    let Some((key, value)) = line.trim().split_once('=') else {
        return LineKind::Other;
    };

    match key {
        "out_time_us" | "out_time_ms" => {
            // ffmpeg reports microseconds under both names.
            if let Ok(us) = value.parse::<i64>() {
                state.out_time_us = us;
            }
            LineKind::Field
        }
        "progress" => {
            if value == "end" {
                state.finished = true;
            }
            LineKind::Report
        }
        k if k.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') => LineKind::Field,
        _ => LineKind::Other,
    }
}

fn parse_duration_us(raw: &str) -> Option<i64> {
    let seconds: f64 = raw.trim().parse().ok()?;
    (seconds.is_finite() && seconds > 0.0).then(|| (seconds * 1_000_000.0) as i64)
}
