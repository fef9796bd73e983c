use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::modules::transcode::model::{JobFailure, TranscodeOutputs};

/// One notification for a client about one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub client_id: String,
    pub job_id: Uuid,
    #[serde(flatten)]
    pub kind: ProgressKind,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressKind {
    /// Percent within the running task.
    TaskProgress { task: String, percent: u8 },
    /// One more task of the job finished.
    JobProgress {
        task: String,
        completed_task_count: u32,
        total_task_count: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_locator: Option<String>,
    },
    /// Sent exactly once per job.
    Terminal {
        succeeded: bool,
        completed_task_count: u32,
        total_task_count: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        outputs: Option<TranscodeOutputs>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<JobFailure>,
    },
}

impl ProgressEvent {
    pub fn new(client_id: &str, job_id: Uuid, kind: ProgressKind) -> Self {
        Self {
            client_id: client_id.to_string(),
            job_id,
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ProgressKind::Terminal { .. })
    }
}

/// Frames pushed over the client socket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WsFrame {
    Connected { client_id: String, message: String },
    UploadProgress(ProgressEvent),
}

impl WsFrame {
    pub fn connected(client_id: &str) -> Self {
        WsFrame::Connected {
            client_id: client_id.to_string(),
            message: "Connected to progress updates".to_string(),
        }
    }
}
