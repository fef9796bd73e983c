use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::{CleanupFailed, TranscodeError};
use crate::media::profile::RenditionMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Pending,
    Staging,
    Encoding,
    Packaging,
    Finalizing,
}

/// Locators of every output of a successful job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TranscodeOutputs {
    pub mp4: Vec<String>,
    pub webm: Vec<String>,
    /// Master manifest.
    pub hls: String,
    /// Poster frame. Best effort, absent when extraction failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl TranscodeOutputs {
    pub fn locator_count(&self) -> usize {
        self.mp4.len()
            + self.webm.len()
            + usize::from(!self.hls.is_empty())
            + usize::from(self.thumbnail.is_some())
    }
}

/// Error payload identifying the failing stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct JobFailure {
    pub stage: JobStage,
    pub kind: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendition: Option<String>,
}

impl From<&TranscodeError> for JobFailure {
    fn from(error: &TranscodeError) -> Self {
        Self {
            stage: error.stage(),
            kind: error.kind().to_string(),
            reason: error.reason().to_string(),
            rendition: error.rendition().map(str::to_string),
        }
    }
}

#[derive(Debug, Default)]
struct TaskLedger {
    completed: u32,
    rendered: Vec<Option<PathBuf>>,
}

/// One end-to-end request. Lives for the duration of a single `run`.
#[derive(Debug)]
pub struct TranscodeJob {
    pub id: Uuid,
    pub source_key: String,
    pub client_id: Option<String>,
    pub total_task_count: u32,
    status: JobStatus,
    stage: JobStage,
    ledger: Mutex<TaskLedger>,
    cleanup_failures: Vec<CleanupFailed>,
}

impl TranscodeJob {
    pub fn new(source_key: &str, client_id: Option<&str>, matrix: &RenditionMatrix) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_key: source_key.to_string(),
            client_id: client_id
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            total_task_count: matrix.total_tasks(),
            status: JobStatus::Pending,
            stage: JobStage::Pending,
            ledger: Mutex::new(TaskLedger {
                completed: 0,
                rendered: vec![None; matrix.renditions().len()],
            }),
            cleanup_failures: Vec::new(),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    pub fn enter(&mut self, stage: JobStage) {
        self.status = JobStatus::Running;
        self.stage = stage;
        info!(job_id = %self.id, stage = ?stage, "Job stage");
    }

    pub fn finish(&mut self, succeeded: bool) {
        self.status = if succeeded {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        };
    }

    /// Count one successfully finished task, recording its rendered file when
    /// it belongs to a rendition slot. `announce` runs with the new count
    /// while the ledger is still held, so announcements leave in count order.
    pub fn complete_task(&self, rendered: Option<(usize, PathBuf)>, announce: impl FnOnce(u32)) {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        ledger.completed = (ledger.completed + 1).min(self.total_task_count);
        if let Some((slot, path)) = rendered {
            if let Some(entry) = ledger.rendered.get_mut(slot) {
                *entry = Some(path);
            }
        }
        announce(ledger.completed);
    }

    /// Count a task that ended in a hard failure.
    pub fn fail_task(&self) {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        ledger.completed = (ledger.completed + 1).min(self.total_task_count);
    }

    pub fn completed_task_count(&self) -> u32 {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .completed
    }

    pub fn rendered(&self, slot: usize) -> Option<PathBuf> {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rendered
            .get(slot)
            .cloned()
            .flatten()
    }

    pub fn record_cleanup_failure(&mut self, failure: CleanupFailed) {
        self.cleanup_failures.push(failure);
    }

    pub fn cleanup_failures(&self) -> &[CleanupFailed] {
        &self.cleanup_failures
    }
}
