//! Encode Task Runner: one engine invocation per task, bounded process-wide.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::media::engine::{EncodeTask, EncodingEngine};

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("encode failed: {reason}")]
    EncodeFailed { reason: String },
}

impl EncodeError {
    fn failed(reason: impl Into<String>) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            EncodeError::EncodeFailed { reason } => reason,
        }
    }
}

pub struct EncodeTaskRunner {
    engine: Arc<dyn EncodingEngine>,
    slots: Arc<Semaphore>,
    task_timeout: Option<Duration>,
}

impl EncodeTaskRunner {
    pub fn new(
        engine: Arc<dyn EncodingEngine>,
        max_concurrent: usize,
        task_timeout: Option<Duration>,
    ) -> Self {
        Self {
            engine,
            slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
            task_timeout,
        }
    }

    /// Run one task to completion and return its output path.
    ///
    /// Engine reports are forwarded as rounded integer percentages in the
    /// order they arrive. No retry is attempted on failure.
    pub async fn encode(
        &self,
        task: EncodeTask,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<PathBuf, EncodeError> {
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| EncodeError::failed("encoder pool is closed"))?;

        if let Some(parent) = task.output.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                EncodeError::failed(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        info!(
            codec = %task.video_codec,
            resolution = %task.resolution,
            output = %task.output.display(),
            "🎥 Encoding"
        );

        let forward = |fraction: f64| on_progress(to_percent(fraction));
        let run = self.engine.execute(&task, &forward);

        let outcome = match self.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!(
                        output = %task.output.display(),
                        "❌ Encode timed out after {:?}",
                        limit
                    );
                    return Err(EncodeError::failed(format!(
                        "timed out after {} seconds",
                        limit.as_secs()
                    )));
                }
            },
            None => run.await,
        };

        if let Err(e) = outcome {
            error!(output = %task.output.display(), "❌ Encode failed: {}", e);
            return Err(EncodeError::failed(e.to_string()));
        }

        if tokio::fs::metadata(&task.output).await.is_err() {
            return Err(EncodeError::failed(format!(
                "encoder reported success but {} is missing",
                task.output.display()
            )));
        }

        info!(output = %task.output.display(), "✅ Encoded");
        Ok(task.output)
    }
}

fn to_percent(fraction: f64) -> u8 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}
