//! Rendition and quality-ladder descriptions shared by the runner, the HLS
//! packager and the orchestrator.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Mp4,
    Webm,
}

impl ContainerFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Webm => "webm",
        }
    }

    pub fn video_codec(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "libx264",
            ContainerFormat::Webm => "libvpx-vp9",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One (format, resolution, bitrate) target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Rendition {
    pub format: ContainerFormat,
    pub resolution: Resolution,
    pub video_bitrate_kbps: u32,
}

impl Rendition {
    /// Stable identity used in task labels and error payloads, e.g. `mp4_1280x720`.
    pub fn label(&self) -> String {
        format!("{}_{}", self.format.extension(), self.resolution)
    }

    pub fn output_file_name(&self, base_name: &str) -> String {
        format!("{}_{}.{}", base_name, self.resolution, self.format.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QualityRung {
    pub name: String,
    pub resolution: Resolution,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
}

impl QualityRung {
    pub fn playlist_file_name(&self) -> String {
        format!("index_{}.m3u8", self.name)
    }

    pub fn segment_pattern(&self) -> String {
        format!("segment_{}_%03d.ts", self.name)
    }

    /// Advertised bandwidth in bits per second.
    pub fn bandwidth(&self) -> u64 {
        u64::from(self.video_bitrate_kbps) * 1000
    }
}

/// Where WebM renditions read their input from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebmInput {
    #[default]
    Source,
    /// Re-encode the MP4 of the same resolution produced earlier in the job.
    /// Only honoured when renditions run sequentially.
    ChainFromMp4,
}

/// The fixed set of outputs a job must produce. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionMatrix {
    renditions: Vec<Rendition>,
    ladder: Vec<QualityRung>,
    webm_input: WebmInput,
}

impl RenditionMatrix {
    pub fn new(renditions: Vec<Rendition>, ladder: Vec<QualityRung>) -> Self {
        Self {
            renditions,
            ladder,
            webm_input: WebmInput::default(),
        }
    }

    pub fn with_webm_input(mut self, webm_input: WebmInput) -> Self {
        self.webm_input = webm_input;
        self
    }

    pub fn renditions(&self) -> &[Rendition] {
        &self.renditions
    }

    pub fn ladder(&self) -> &[QualityRung] {
        &self.ladder
    }

    pub fn webm_input(&self) -> WebmInput {
        self.webm_input
    }

    /// Every rendition plus the HLS package, which counts as one task.
    pub fn total_tasks(&self) -> u32 {
        self.renditions.len() as u32 + 1
    }
}
