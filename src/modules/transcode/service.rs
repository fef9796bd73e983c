//! Transcode Orchestrator: stages a source, drives every rendition and the
//! HLS package through the shared runner, publishes outputs and always
//! cleans up after itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::try_join_all;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::error::{CleanupFailed, TranscodeError};
use super::model::{JobFailure, JobStage, TranscodeJob, TranscodeOutputs};
use crate::config::media::{HLS_SEGMENT_SECONDS, THUMBNAIL_RESOLUTION, THUMBNAIL_SEEK_PERCENT};
use crate::config::settings::TranscodeConfig;
use crate::infrastructure::storage::{content_type_for, ArtifactStore, Publication};
use crate::media::engine::EncodeTask;
use crate::media::hls::{HlsPackager, MASTER_PLAYLIST};
use crate::media::profile::{
    ContainerFormat, QualityRung, Rendition, RenditionMatrix, WebmInput,
};
use crate::media::runner::EncodeTaskRunner;
use crate::modules::progress::broadcaster::ProgressBroadcaster;
use crate::modules::progress::events::{ProgressEvent, ProgressKind};

const HLS_TASK: &str = "hls";

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub work_dir: PathBuf,
    pub output_prefix: String,
    pub parallel_renditions: bool,
    pub purge_source: bool,
}

impl From<&TranscodeConfig> for OrchestratorSettings {
    fn from(config: &TranscodeConfig) -> Self {
        Self {
            work_dir: config.work_dir.clone(),
            output_prefix: config.output_prefix.clone(),
            parallel_renditions: config.parallel_renditions,
            purge_source: config.purge_source,
        }
    }
}

/// Where one job renders its outputs and which store keys they map to.
struct OutputLayout {
    render_root: PathBuf,
    key_prefix: String,
    base_name: String,
}

impl OutputLayout {
    fn key(&self, name: &str) -> String {
        if self.key_prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.key_prefix, name)
        }
    }

    fn rendition_key(&self, rendition: &Rendition) -> String {
        self.key(&rendition.output_file_name(&self.base_name))
    }

    fn hls_dir_key(&self) -> String {
        self.key(&format!("{}_hls", self.base_name))
    }

    fn manifest_key(&self) -> String {
        format!("{}/{}", self.hls_dir_key(), MASTER_PLAYLIST)
    }

    fn thumbnail_key(&self) -> String {
        self.key(&format!("{}_thumbnail.jpg", self.base_name))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.render_root.join(key)
    }
}

pub struct TranscodeOrchestrator {
    store: Arc<dyn ArtifactStore>,
    runner: Arc<EncodeTaskRunner>,
    packager: HlsPackager,
    broadcaster: ProgressBroadcaster,
    matrix: Arc<RenditionMatrix>,
    settings: OrchestratorSettings,
}

impl TranscodeOrchestrator {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        runner: Arc<EncodeTaskRunner>,
        broadcaster: ProgressBroadcaster,
        matrix: Arc<RenditionMatrix>,
        settings: OrchestratorSettings,
    ) -> Self {
        let packager = HlsPackager::new(runner.clone(), HLS_SEGMENT_SECONDS);
        Self {
            store,
            runner,
            packager,
            broadcaster,
            matrix,
            settings,
        }
    }

    /// Run a job on its own task. Dropping the returned handle, as happens
    /// when an HTTP caller goes away, detaches the job instead of cancelling it.
    pub fn spawn(
        self: &Arc<Self>,
        source_key: String,
        client_id: Option<String>,
    ) -> JoinHandle<Result<TranscodeOutputs, TranscodeError>> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.run(&source_key, client_id.as_deref()).await })
    }

    /// Run one job to completion. Exactly one terminal event is published
    /// to `client_id` whatever the outcome; a blank id runs silently.
    pub async fn run(
        &self,
        source_key: &str,
        client_id: Option<&str>,
    ) -> Result<TranscodeOutputs, TranscodeError> {
        let mut job = TranscodeJob::new(source_key, client_id, &self.matrix);
        let scratch = self.settings.work_dir.join(job.id.to_string());
        let layout = self.layout(source_key, &job, &scratch);

        info!(
            job_id = %job.id,
            source_key = %source_key,
            client_id = job.client_id.as_deref().unwrap_or("-"),
            total_tasks = job.total_task_count,
            "🎥 Transcode job started"
        );

        let outcome = self.drive(&mut job, &scratch, &layout).await;

        self.cleanup(&mut job, &scratch, outcome.is_ok()).await;
        job.finish(outcome.is_ok());

        match &outcome {
            Ok(outputs) => info!(
                job_id = %job.id,
                status = ?job.status(),
                locators = outputs.locator_count(),
                "✅ Transcode job succeeded"
            ),
            Err(e) => error!(
                job_id = %job.id,
                status = ?job.status(),
                stage = ?job.stage(),
                "❌ Transcode job failed: {}",
                e
            ),
        }

        self.publish_terminal(&job, &outcome);
        outcome
    }

    fn layout(&self, source_key: &str, job: &TranscodeJob, scratch: &Path) -> OutputLayout {
        let render_root = match self.store.publication() {
            Publication::InPlace { root } => root,
            Publication::Remote => scratch.join("out"),
        };

        OutputLayout {
            render_root,
            key_prefix: self.settings.output_prefix.trim_matches('/').to_string(),
            base_name: base_name(source_key).unwrap_or_else(|| job.id.to_string()),
        }
    }

    async fn drive(
        &self,
        job: &mut TranscodeJob,
        scratch: &Path,
        layout: &OutputLayout,
    ) -> Result<TranscodeOutputs, TranscodeError> {
        job.enter(JobStage::Staging);
        let source = self.stage_source(job, scratch).await?;

        job.enter(JobStage::Encoding);
        self.encode_renditions(job, &source, layout).await?;

        job.enter(JobStage::Packaging);
        self.package(job, &source, layout).await?;
        let thumbnail = self.extract_thumbnail(job, &source, layout).await;

        job.enter(JobStage::Finalizing);
        self.finalize(job, layout, thumbnail).await
    }

    async fn stage_source(
        &self,
        job: &TranscodeJob,
        scratch: &Path,
    ) -> Result<PathBuf, TranscodeError> {
        let unavailable = |reason: String| TranscodeError::SourceUnavailable {
            key: job.source_key.clone(),
            reason,
        };

        let bytes = self
            .store
            .fetch(&job.source_key)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        tokio::fs::create_dir_all(scratch)
            .await
            .map_err(|e| unavailable(format!("cannot create {}: {}", scratch.display(), e)))?;

        let extension = Path::new(&job.source_key)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("bin");
        let staged = scratch.join(format!("source.{}", extension));

        tokio::fs::write(&staged, &bytes)
            .await
            .map_err(|e| unavailable(format!("cannot stage to {}: {}", staged.display(), e)))?;

        info!(job_id = %job.id, size_bytes = bytes.len(), "Source staged");
        Ok(staged)
    }

    async fn encode_renditions(
        &self,
        job: &TranscodeJob,
        source: &Path,
        layout: &OutputLayout,
    ) -> Result<(), TranscodeError> {
        let renditions = self.matrix.renditions();

        if self.settings.parallel_renditions {
            let runs = renditions.iter().enumerate().map(|(slot, rendition)| {
                self.encode_rendition(job, source, layout, slot, rendition)
            });
            try_join_all(runs).await?;
            return Ok(());
        }

        for (slot, rendition) in renditions.iter().enumerate() {
            let input = self.rendition_input(job, source, rendition);
            self.encode_rendition(job, &input, layout, slot, rendition).await?;
        }
        Ok(())
    }

    /// Input for a rendition when running sequentially.
    fn rendition_input(
        &self,
        job: &TranscodeJob,
        source: &Path,
        rendition: &Rendition,
    ) -> PathBuf {
        if rendition.format != ContainerFormat::Webm
            || self.matrix.webm_input() != WebmInput::ChainFromMp4
        {
            return source.to_path_buf();
        }

        self.matrix
            .renditions()
            .iter()
            .position(|r| {
                r.format == ContainerFormat::Mp4 && r.resolution == rendition.resolution
            })
            .and_then(|slot| job.rendered(slot))
            .unwrap_or_else(|| source.to_path_buf())
    }

    async fn encode_rendition(
        &self,
        job: &TranscodeJob,
        input: &Path,
        layout: &OutputLayout,
        slot: usize,
        rendition: &Rendition,
    ) -> Result<(), TranscodeError> {
        let label = rendition.label();
        let key = layout.rendition_key(rendition);
        let task = EncodeTask::file(
            input,
            layout.path_for(&key),
            rendition.format.video_codec(),
            rendition.resolution,
            rendition.video_bitrate_kbps,
        );

        let forward = |percent: u8| {
            self.publish(
                job,
                ProgressKind::TaskProgress {
                    task: label.clone(),
                    percent,
                },
            )
        };

        match self.runner.encode(task, &forward).await {
            Ok(rendered) => {
                let output_locator = self.in_place_locator(&key);
                job.complete_task(Some((slot, rendered)), |completed| {
                    self.publish(
                        job,
                        ProgressKind::JobProgress {
                            task: label.clone(),
                            completed_task_count: completed,
                            total_task_count: job.total_task_count,
                            output_locator,
                        },
                    )
                });
                Ok(())
            }
            Err(e) => {
                job.fail_task();
                Err(TranscodeError::EncodeFailed {
                    rendition: label,
                    reason: e.reason().to_string(),
                })
            }
        }
    }

    async fn package(
        &self,
        job: &TranscodeJob,
        source: &Path,
        layout: &OutputLayout,
    ) -> Result<PathBuf, TranscodeError> {
        let output_dir = layout.path_for(&layout.hls_dir_key());

        let forward = |rung: &QualityRung, percent: u8| {
            self.publish(
                job,
                ProgressKind::TaskProgress {
                    task: format!("{}_{}", HLS_TASK, rung.name),
                    percent,
                },
            )
        };

        match self
            .packager
            .build_adaptive_set(source, &output_dir, self.matrix.ladder(), &forward)
            .await
        {
            Ok(manifest) => {
                let output_locator = self.in_place_locator(&layout.manifest_key());
                job.complete_task(None, |completed| {
                    self.publish(
                        job,
                        ProgressKind::JobProgress {
                            task: HLS_TASK.to_string(),
                            completed_task_count: completed,
                            total_task_count: job.total_task_count,
                            output_locator,
                        },
                    )
                });
                Ok(manifest)
            }
            Err(e) => {
                job.fail_task();
                Err(TranscodeError::PackagingFailed {
                    reason: e.reason().to_string(),
                })
            }
        }
    }

    /// Poster frame of the source. Not a counted task; a failure only costs
    /// the thumbnail.
    async fn extract_thumbnail(
        &self,
        job: &TranscodeJob,
        source: &Path,
        layout: &OutputLayout,
    ) -> Option<PathBuf> {
        let task = EncodeTask::frame(
            source,
            layout.path_for(&layout.thumbnail_key()),
            THUMBNAIL_RESOLUTION,
            THUMBNAIL_SEEK_PERCENT,
        );
        let silent = |_: u8| {};

        match self.runner.encode(task, &silent).await {
            Ok(rendered) => Some(rendered),
            Err(e) => {
                warn!(job_id = %job.id, "Thumbnail extraction failed: {}", e.reason());
                None
            }
        }
    }

    async fn finalize(
        &self,
        job: &TranscodeJob,
        layout: &OutputLayout,
        thumbnail: Option<PathBuf>,
    ) -> Result<TranscodeOutputs, TranscodeError> {
        let remote = self.store.publication() == Publication::Remote;
        let mut outputs = TranscodeOutputs::default();

        for (slot, rendition) in self.matrix.renditions().iter().enumerate() {
            let key = layout.rendition_key(rendition);
            let rendered = job.rendered(slot).ok_or_else(|| TranscodeError::StoreWriteFailed {
                key: key.clone(),
                reason: format!("{} was never rendered", rendition.label()),
            })?;

            let locator = if remote {
                self.upload(&rendered, &key).await?
            } else {
                self.store.locate(&key)
            };

            match rendition.format {
                ContainerFormat::Mp4 => outputs.mp4.push(locator),
                ContainerFormat::Webm => outputs.webm.push(locator),
            }
        }

        if let Some(rendered) = thumbnail {
            outputs.thumbnail = self
                .publish_thumbnail(job, &rendered, &layout.thumbnail_key(), remote)
                .await;
        }

        outputs.hls = if remote {
            self.upload_hls(layout).await?
        } else {
            self.store.locate(&layout.manifest_key())
        };

        Ok(outputs)
    }

    async fn publish_thumbnail(
        &self,
        job: &TranscodeJob,
        rendered: &Path,
        key: &str,
        remote: bool,
    ) -> Option<String> {
        if !remote {
            return Some(self.store.locate(key));
        }

        match self.upload(rendered, key).await {
            Ok(locator) => Some(locator),
            Err(e) => {
                warn!(job_id = %job.id, "Thumbnail upload failed: {}", e);
                None
            }
        }
    }

    /// Upload rung playlists and segments, then the master manifest last so
    /// it never references an object that is not there yet.
    async fn upload_hls(&self, layout: &OutputLayout) -> Result<String, TranscodeError> {
        let dir_key = layout.hls_dir_key();
        let dir = layout.path_for(&dir_key);
        let write_failed = |reason: String| TranscodeError::StoreWriteFailed {
            key: dir_key.clone(),
            reason,
        };

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| write_failed(e.to_string()))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if name != MASTER_PLAYLIST && !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        for name in &names {
            self.upload(&dir.join(name), &format!("{}/{}", dir_key, name))
                .await?;
        }

        self.upload(&dir.join(MASTER_PLAYLIST), &layout.manifest_key()).await
    }

    async fn upload(&self, path: &Path, key: &str) -> Result<String, TranscodeError> {
        let write_failed = |reason: String| TranscodeError::StoreWriteFailed {
            key: key.to_string(),
            reason,
        };

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| write_failed(format!("cannot read {}: {}", path.display(), e)))?;

        self.store
            .put(key, Bytes::from(data), &content_type_for(key))
            .await
            .map_err(|e| write_failed(e.to_string()))
    }

    /// Runs on every exit path; failures here never change the outcome.
    async fn cleanup(&self, job: &mut TranscodeJob, scratch: &Path, succeeded: bool) {
        match tokio::fs::remove_dir_all(scratch).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => job.record_cleanup_failure(CleanupFailed {
                target: scratch.display().to_string(),
                reason: e.to_string(),
            }),
        }

        if succeeded && self.settings.purge_source {
            if let Err(e) = self.store.remove(&job.source_key).await {
                job.record_cleanup_failure(CleanupFailed {
                    target: job.source_key.clone(),
                    reason: e.to_string(),
                });
            }
        }

        for failure in job.cleanup_failures() {
            warn!(job_id = %job.id, "{}", failure);
        }
    }

    fn in_place_locator(&self, key: &str) -> Option<String> {
        match self.store.publication() {
            Publication::InPlace { .. } => Some(self.store.locate(key)),
            Publication::Remote => None,
        }
    }

    fn publish(&self, job: &TranscodeJob, kind: ProgressKind) {
        if let Some(client_id) = &job.client_id {
            self.broadcaster
                .publish(client_id, ProgressEvent::new(client_id, job.id, kind));
        }
    }

    fn publish_terminal(
        &self,
        job: &TranscodeJob,
        outcome: &Result<TranscodeOutputs, TranscodeError>,
    ) {
        self.publish(
            job,
            ProgressKind::Terminal {
                succeeded: outcome.is_ok(),
                completed_task_count: job.completed_task_count(),
                total_task_count: job.total_task_count,
                outputs: outcome.as_ref().ok().cloned(),
                error: outcome.as_ref().err().map(JobFailure::from),
            },
        );
    }
}

/// File stem of the last key segment, e.g. `uploads/123-clip.mp4` -> `123-clip`.
fn base_name(source_key: &str) -> Option<String> {
    Path::new(source_key)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}
