use std::sync::Arc;

use crate::config::media::rendition_matrix;
use crate::config::settings::AppConfig;
use crate::infrastructure::storage::{build_store, ArtifactStore};
use crate::media::ffmpeg::FfmpegEngine;
use crate::media::runner::EncodeTaskRunner;
use crate::modules::progress::broadcaster::ProgressBroadcaster;
use crate::modules::transcode::service::{OrchestratorSettings, TranscodeOrchestrator};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn ArtifactStore>,
    pub broadcaster: ProgressBroadcaster,
    pub orchestrator: Arc<TranscodeOrchestrator>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ArtifactStore>,
        broadcaster: ProgressBroadcaster,
        orchestrator: Arc<TranscodeOrchestrator>,
    ) -> Self {
        Self {
            config,
            store,
            broadcaster,
            orchestrator,
        }
    }

    /// Wire the store, the shared encoder pool and the orchestrator from config.
    pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
        let store = build_store(&config.storage).await?;
        let transcode = &config.transcode;

        tokio::fs::create_dir_all(&transcode.work_dir).await?;

        let engine = Arc::new(FfmpegEngine::new(
            transcode.ffmpeg_path.clone(),
            transcode.ffprobe_path.clone(),
        ));
        let runner = Arc::new(EncodeTaskRunner::new(
            engine,
            transcode.max_concurrent_encodes,
            transcode.task_timeout,
        ));

        let broadcaster = ProgressBroadcaster::new();
        let matrix = Arc::new(rendition_matrix().with_webm_input(transcode.webm_input));
        let orchestrator = Arc::new(TranscodeOrchestrator::new(
            store.clone(),
            runner,
            broadcaster.clone(),
            matrix,
            OrchestratorSettings::from(transcode),
        ));

        Ok(Self::new(config, store, broadcaster, orchestrator))
    }
}
