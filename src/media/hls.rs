//! HLS packaging: one segmenting encode per rung, then a master manifest.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::media::engine::EncodeTask;
use crate::media::profile::QualityRung;
use crate::media::runner::EncodeTaskRunner;

pub const MASTER_PLAYLIST: &str = "master.m3u8";

#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("HLS packaging failed: {reason}")]
    PackagingFailed { reason: String },
}

impl PackagingError {
    fn failed(reason: impl Into<String>) -> Self {
        Self::PackagingFailed {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            PackagingError::PackagingFailed { reason } => reason,
        }
    }
}

pub struct HlsPackager {
    runner: Arc<EncodeTaskRunner>,
    segment_seconds: u32,
}

impl HlsPackager {
    pub fn new(runner: Arc<EncodeTaskRunner>, segment_seconds: u32) -> Self {
        Self {
            runner,
            segment_seconds,
        }
    }

    /// Segment `input` once per rung into `output_dir`, then publish the master
    /// manifest. The manifest only appears after every rung playlist exists;
    /// on failure, rung outputs are left in place and no manifest is written.
    pub async fn build_adaptive_set(
        &self,
        input: &Path,
        output_dir: &Path,
        ladder: &[QualityRung],
        on_progress: &(dyn Fn(&QualityRung, u8) + Send + Sync),
    ) -> Result<PathBuf, PackagingError> {
        if ladder.is_empty() {
            return Err(PackagingError::failed("quality ladder is empty"));
        }

        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            PackagingError::failed(format!("cannot create {}: {}", output_dir.display(), e))
        })?;

        for rung in ladder {
            let task = EncodeTask::file(
                input,
                output_dir.join(rung.playlist_file_name()),
                "libx264",
                rung.resolution,
                rung.video_bitrate_kbps,
            )
            .with_audio("aac", rung.audio_bitrate_kbps)
            .segmented(self.segment_seconds, output_dir.join(rung.segment_pattern()));

            self.runner
                .encode(task, &|percent| on_progress(rung, percent))
                .await
                .map_err(|e| {
                    error!(rung = %rung.name, "❌ Error creating HLS rung: {}", e);
                    PackagingError::failed(format!("rung {}: {}", rung.name, e.reason()))
                })?;
        }

        for rung in ladder {
            let playlist = output_dir.join(rung.playlist_file_name());
            if tokio::fs::metadata(&playlist).await.is_err() {
                return Err(PackagingError::failed(format!(
                    "rung {} playlist {} is missing",
                    rung.name,
                    playlist.display()
                )));
            }
        }

        let manifest = write_master_playlist(output_dir, ladder)
            .await
            .map_err(|e| PackagingError::failed(format!("cannot write master playlist: {}", e)))?;

        info!("✅ Master playlist created: {}", manifest.display());
        Ok(manifest)
    }
}

pub fn render_master_playlist(ladder: &[QualityRung]) -> String {
    let mut lines = vec!["#EXTM3U".to_string()];
    for rung in ladder {
        lines.push(format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}",
            rung.bandwidth(),
            rung.resolution
        ));
        lines.push(rung.playlist_file_name());
    }
    let mut playlist = lines.join("\n");
    playlist.push('\n');
    playlist
}

/// Write-then-rename so readers never observe a partial manifest.
async fn write_master_playlist(
    output_dir: &Path,
    ladder: &[QualityRung],
) -> std::io::Result<PathBuf> {
    let manifest = output_dir.join(MASTER_PLAYLIST);
    let staging = output_dir.join(format!(".{}.tmp", MASTER_PLAYLIST));

    tokio::fs::write(&staging, render_master_playlist(ladder)).await?;
    tokio::fs::rename(&staging, &manifest).await?;
    Ok(manifest)
}
