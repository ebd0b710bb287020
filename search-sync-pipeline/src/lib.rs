//! # Search Sync Pipeline
//!
//! This crate provides the pipeline components that keep the search index in
//! step with the primary record store.
//!
//! ## Architecture
//!
//! Migration follows the Extraction-Processor-Loader pattern:
//!
//! 1. **Extraction**: Lists export files and decodes their records
//! 2. **Processor**: Resolves the index target of each published document
//! 3. **Loader**: Bulk indexes documents through the indexing gateway
//! 4. **Continuation**: Bounds the files per invocation and emits the follow-up job
//!
//! The change-stream path runs each notification through the stream
//! processor and applies the result with the loader (**Sync**).

pub mod continuation;
pub mod errors;
pub mod extraction;
pub mod loader;
pub mod processor;
pub mod storage;
pub mod sync;

pub use continuation::{
    CollectingEmitter, ContinuationConfig, ContinuationController, ContinuationEmitter,
    ContinuationState, JsonLinesEmitter,
};
pub use errors::PipelineError;
pub use extraction::{ExtractedDocument, ExtractionPipeline, FileExtract, FileStats};
pub use loader::{LoadReport, SearchLoader};
pub use processor::{DocumentProcessor, PublicationFilter, StreamProcessor, SyncAction, TargetConfig};
pub use storage::{MemoryBackend, ObjectMeta, ObjectStoreBackend, StorageBackend, StorageError};
pub use sync::{Applied, StreamSummary, StreamSynchronizer};
