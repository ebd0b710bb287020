//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations.

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::types::{BatchOperationSummary, DeleteOutcome, IndexPreparation};
use search_sync_shared::{CanonicalDocument, DocumentEnvelope, IndexTarget};

/// Abstracts the underlying search engine.
///
/// Implementations are injected into `SearchIndexClient` to enable dependency
/// injection and easy testing with mock implementations. All methods return
/// `Result<T, SearchIndexError>` for consistent error handling across backends.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Create or replace a single document.
    ///
    /// # Arguments
    ///
    /// * `target` - Index and identifier the document is written to
    /// * `document` - The document body
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the engine accepted the document
    /// * `Err(SearchIndexError)` - If indexing fails
    async fn index_document(
        &self,
        target: &IndexTarget,
        document: &CanonicalDocument,
    ) -> Result<(), SearchIndexError>;

    /// Delete every document carrying `document_id` across the managed indices.
    ///
    /// The caller does not know which index holds the document, so the
    /// deletion is by identifier rather than by index and identifier.
    ///
    /// # Returns
    ///
    /// * `Ok(DeleteOutcome::Deleted(n))` - If `n` documents were removed
    /// * `Ok(DeleteOutcome::NotFound)` - If no document matched
    /// * `Err(SearchIndexError)` - If the request fails
    async fn delete_document(&self, document_id: &str) -> Result<DeleteOutcome, SearchIndexError>;

    /// Create or replace a batch of documents in one request.
    ///
    /// The request is made visible to search before returning.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-document results in input order
    /// * `Err(SearchIndexError)` - If the request as a whole fails
    async fn bulk_index_documents(
        &self,
        batch: &[DocumentEnvelope],
    ) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Create `index` if missing, otherwise apply the refresh interval to it.
    async fn prepare_index(&self, index: &str) -> Result<IndexPreparation, SearchIndexError>;

    /// Whether the cluster is able to serve writes.
    async fn health_check(&self) -> Result<bool, SearchIndexError>;
}
