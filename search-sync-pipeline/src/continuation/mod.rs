//! Bounded migration invocations.
//!
//! One invocation processes at most `max_files` export files starting at the
//! job's marker. When files remain it emits a continuation job carrying the
//! key of the next unprocessed file.

mod emitter;

pub use emitter::{CollectingEmitter, ContinuationEmitter, JsonLinesEmitter};

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::errors::PipelineError;
use crate::extraction::{ExtractionPipeline, FileStats};
use crate::loader::SearchLoader;
use crate::processor::DocumentProcessor;
use search_sync_shared::{ImportJob, IndexingFailure, IndexingOutcome};

/// Default number of files per invocation.
pub const DEFAULT_MAX_FILES: usize = 100;

/// How a finished invocation left its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationState {
    /// Every file was processed.
    Done,
    /// Files remain; a continuation was emitted.
    Truncated,
}

impl ContinuationState {
    /// State of the invocation that produced `outcome`.
    pub fn of(outcome: &IndexingOutcome) -> Self {
        if outcome.truncated {
            Self::Truncated
        } else {
            Self::Done
        }
    }
}

/// Configuration for the continuation controller.
#[derive(Debug, Clone, Copy)]
pub struct ContinuationConfig {
    /// Maximum number of files processed per invocation.
    pub max_files: usize,
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

impl ContinuationConfig {
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.max_files == 0 {
            return Err(PipelineError::config("max_files must be at least 1"));
        }
        Ok(())
    }
}

/// Drives one bounded migration invocation: extraction, target resolution
/// and loading of each file, then the continuation.
pub struct ContinuationController {
    extraction: ExtractionPipeline,
    processor: DocumentProcessor,
    loader: SearchLoader,
    emitter: Arc<dyn ContinuationEmitter>,
    config: ContinuationConfig,
}

impl ContinuationController {
    /// Create a new controller.
    ///
    /// # Returns
    ///
    /// * `Ok(ContinuationController)` - Ready to run jobs
    /// * `Err(PipelineError::ConfigError)` - If `max_files` is zero
    pub fn new(
        extraction: ExtractionPipeline,
        processor: DocumentProcessor,
        loader: SearchLoader,
        emitter: Arc<dyn ContinuationEmitter>,
        config: ContinuationConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            extraction,
            processor,
            loader,
            emitter,
            config,
        })
    }

    pub fn config(&self) -> &ContinuationConfig {
        &self.config
    }

    /// Run one invocation of `job`.
    ///
    /// Per-record and per-document problems end up in the outcome's
    /// failures. Storage, engine and emitter failures abort the invocation
    /// and nothing is emitted.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexingOutcome)` - Failures, marker and truncation of this run
    /// * `Err(PipelineError)` - If the invocation was aborted
    #[instrument(skip(self, job), fields(location = %job.location, marker = ?job.marker))]
    pub async fn run(&self, job: &ImportJob) -> Result<IndexingOutcome, PipelineError> {
        debug!(max_files = self.config.max_files, "Starting migration invocation");

        let files = self
            .extraction
            .list_files(&job.location, job.marker.as_deref())
            .await?;

        let mut outcome = IndexingOutcome::default();
        let mut totals = FileStats::default();

        for meta in files.iter().take(self.config.max_files) {
            let extract = self.extraction.read_file(&job.location.bucket, meta).await?;
            totals.absorb(&extract.stats);
            outcome.failures.extend(extract.failures);

            let batch = self.processor.process_batch(
                extract
                    .documents
                    .into_iter()
                    .map(|d| (d.source, d.document))
                    .collect(),
            );
            outcome.failures.extend(
                batch
                    .unresolved
                    .into_iter()
                    .map(|(source, e)| IndexingFailure::for_record(source, e.to_string())),
            );

            let report = self.loader.load(batch.envelopes).await?;
            outcome.documents_indexed += report.indexed;
            outcome.failures.extend(
                report
                    .failures
                    .into_iter()
                    .map(|failure| failure.with_source(meta.key.clone())),
            );
            outcome.files_processed += 1;

            info!(
                key = %meta.key,
                indexed = report.indexed,
                failures = outcome.failures.len(),
                "Processed export file"
            );
        }

        if let Some(next) = files.get(self.config.max_files) {
            outcome.truncated = true;
            outcome.next_marker = Some(next.key.clone());
            self.emitter.emit(&job.continue_at(next.key.clone())).await?;
        }

        info!(
            state = ?ContinuationState::of(&outcome),
            files = outcome.files_processed,
            records = totals.records,
            published = totals.published,
            filtered = totals.filtered,
            decode_failures = totals.failed,
            indexed = outcome.documents_indexed,
            failures = outcome.failures.len(),
            next_marker = ?outcome.next_marker,
            "Migration invocation finished"
        );

        Ok(outcome)
    }
}
