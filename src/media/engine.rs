//! Boundary to the external encoding engine.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::media::profile::Resolution;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start encoder: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("encoder exited with status {code:?}: {stderr}")]
    Exited { code: Option<i32>, stderr: String },

    #[error("encoder I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeMode {
    /// A single self-contained output file.
    File,
    /// HLS segmenting: `output` is the playlist, segments follow `segment_pattern`.
    Segmented {
        segment_seconds: u32,
        segment_pattern: PathBuf,
    },
    /// One still frame taken `seek_percent` of the way into the source.
    Frame { seek_percent: u8 },
}

/// One (source, target) conversion unit. Owned by the runner for the
/// duration of a single engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeTask {
    pub input: PathBuf,
    pub output: PathBuf,
    pub video_codec: String,
    pub resolution: Resolution,
    pub video_bitrate_kbps: u32,
    pub audio: Option<AudioSettings>,
    pub mode: EncodeMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSettings {
    pub codec: String,
    pub bitrate_kbps: u32,
}

impl EncodeTask {
    pub fn file(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        video_codec: impl Into<String>,
        resolution: Resolution,
        video_bitrate_kbps: u32,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            video_codec: video_codec.into(),
            resolution,
            video_bitrate_kbps,
            audio: None,
            mode: EncodeMode::File,
        }
    }

    /// A single JPEG frame scaled to `resolution`.
    pub fn frame(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        resolution: Resolution,
        seek_percent: u8,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            video_codec: "mjpeg".to_string(),
            resolution,
            video_bitrate_kbps: 0,
            audio: None,
            mode: EncodeMode::Frame {
                seek_percent: seek_percent.min(100),
            },
        }
    }

    pub fn segmented(mut self, segment_seconds: u32, segment_pattern: impl Into<PathBuf>) -> Self {
        self.mode = EncodeMode::Segmented {
            segment_seconds,
            segment_pattern: segment_pattern.into(),
        };
        self
    }

    pub fn with_audio(mut self, codec: impl Into<String>, bitrate_kbps: u32) -> Self {
        self.audio = Some(AudioSettings {
            codec: codec.into(),
            bitrate_kbps,
        });
        self
    }
}

/// An engine reports fractional progress in `[0, 1]` at its own cadence and
/// resolves once the invocation terminates.
#[async_trait]
pub trait EncodingEngine: Send + Sync {
    async fn execute(
        &self,
        task: &EncodeTask,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), EngineError>;
}
