//! # Search Sync Shared
//!
//! Shared types used by the migration and change-stream paths of the search
//! index synchronizer: trigger payloads, document envelopes, stream
//! notifications and per-invocation outcomes.

pub mod document;
pub mod errors;
pub mod job;
pub mod notification;
pub mod outcome;

pub use document::{CanonicalDocument, ConsumptionAttributes, DocumentEnvelope, IndexTarget};
pub use errors::{ErrorKind, InputError};
pub use job::{ImportJob, SourceLocation};
pub use notification::{EventType, StreamBatch, StreamImages, StreamNotification, STREAM_SUCCESS};
pub use outcome::{IndexingFailure, IndexingOutcome};
