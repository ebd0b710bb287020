//! # Search Sync Repository
//!
//! This crate provides the search engine side of the synchronizer: the
//! provider trait, an OpenSearch implementation, and the indexing gateway
//! that batches writes and isolates per-document failures.

pub mod client;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod types;

pub use client::SearchIndexClient;
pub use config::{RetryConfig, SearchIndexConfig};
pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use opensearch::{IndexConfig, OpenSearchClient};
pub use types::{
    BatchOperationResult, BatchOperationSummary, BulkUpsertReport, DeleteOutcome,
    IndexPreparation,
};
