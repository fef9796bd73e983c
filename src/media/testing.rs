//! Scripted engine used by unit tests in place of ffmpeg.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::media::engine::{EncodeMode, EncodeTask, EncodingEngine, EngineError};

#[derive(Default)]
pub struct ScriptedEngine {
    reports: Vec<f64>,
    fail_on_call: Option<usize>,
    skip_output: bool,
    delay: Option<Duration>,
    invocations: Mutex<Vec<EncodeTask>>,
    master_seen: Mutex<Vec<bool>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            reports: vec![0.0, 0.5, 1.0],
            ..Self::default()
        }
    }

    pub fn with_reports(mut self, reports: Vec<f64>) -> Self {
        self.reports = reports;
        self
    }

    /// Fail the n-th invocation (1-based).
    pub fn fail_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    pub fn skip_output(mut self) -> Self {
        self.skip_output = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn invocations(&self) -> Vec<EncodeTask> {
        self.invocations.lock().unwrap().clone()
    }

    /// For each segmenting invocation, whether a master manifest already
    /// existed next to the rung playlist when it started.
    pub fn master_seen_during_segmenting(&self) -> Vec<bool> {
        self.master_seen.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EncodingEngine for ScriptedEngine {
    async fn execute(
        &self,
        task: &EncodeTask,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<(), EngineError> {
        let call = {
            let mut invocations = self.invocations.lock().unwrap();
            invocations.push(task.clone());
            invocations.len()
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let EncodeMode::Segmented { .. } = task.mode {
            let master = task.output.with_file_name("master.m3u8");
            self.master_seen.lock().unwrap().push(master.exists());
        }

        for fraction in &self.reports {
            on_progress(*fraction);
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_on_call == Some(call) {
            return Err(EngineError::Exited {
                code: Some(1),
                stderr: "scripted failure".to_string(),
            });
        }

        if !self.skip_output {
            write_outputs(task).await?;
        }
        Ok(())
    }
}

async fn write_outputs(task: &EncodeTask) -> Result<(), EngineError> {
    if let Some(parent) = task.output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if let EncodeMode::Segmented {
        segment_pattern, ..
    } = &task.mode
    {
        let segment = segment_name(segment_pattern, 0);
        tokio::fs::write(&segment, b"segment").await?;
        let playlist = format!(
            "#EXTM3U\n#EXTINF:10.0,\n{}\n#EXT-X-ENDLIST\n",
            Path::new(&segment)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        );
        tokio::fs::write(&task.output, playlist).await?;
    } else {
        tokio::fs::write(&task.output, b"encoded").await?;
    }
    Ok(())
}

fn segment_name(pattern: &Path, index: u32) -> String {
    pattern
        .to_string_lossy()
        .replace("%03d", &format!("{:03}", index))
}
