//! Continuation emitters.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::errors::PipelineError;
use search_sync_shared::ImportJob;

/// Sink for the follow-up job of a truncated invocation.
#[async_trait]
pub trait ContinuationEmitter: Send + Sync {
    /// Hand `job` to whatever triggers the next invocation.
    async fn emit(&self, job: &ImportJob) -> Result<(), PipelineError>;
}

/// Writes each continuation as one trigger payload per line.
pub struct JsonLinesEmitter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> Result<W, PipelineError> {
        self.writer
            .into_inner()
            .map_err(|_| PipelineError::emit("writer lock poisoned"))
    }
}

#[async_trait]
impl<W: Write + Send> ContinuationEmitter for JsonLinesEmitter<W> {
    async fn emit(&self, job: &ImportJob) -> Result<(), PipelineError> {
        let payload = job.to_payload();
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| PipelineError::emit("writer lock poisoned"))?;

        writeln!(writer, "{}", payload).map_err(|e| PipelineError::emit(e.to_string()))?;
        writer.flush().map_err(|e| PipelineError::emit(e.to_string()))?;

        info!(marker = ?job.marker, "Emitted continuation");
        Ok(())
    }
}

/// Keeps emitted jobs in memory, for in-process follow loops and tests.
#[derive(Default)]
pub struct CollectingEmitter {
    jobs: Mutex<Vec<ImportJob>>,
}

impl CollectingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the jobs emitted so far.
    pub fn take(&self) -> Vec<ImportJob> {
        match self.jobs.lock() {
            Ok(mut jobs) => std::mem::take(&mut *jobs),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl ContinuationEmitter for CollectingEmitter {
    async fn emit(&self, job: &ImportJob) -> Result<(), PipelineError> {
        self.jobs
            .lock()
            .map_err(|_| PipelineError::emit("job list lock poisoned"))?
            .push(job.clone());
        Ok(())
    }
}
