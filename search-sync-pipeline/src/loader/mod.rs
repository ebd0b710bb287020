//! Loader module for the search sync pipeline.
//!
//! Loads processed documents into the search index through the indexing
//! gateway.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::PipelineError;
use search_sync_repository::{DeleteOutcome, IndexPreparation, SearchIndexClient};
use search_sync_shared::{DocumentEnvelope, IndexingFailure};

/// What loading one group of envelopes did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Documents accepted by the search engine.
    pub indexed: usize,
    /// Documents the engine or the gateway rejected, in submission order.
    pub failures: Vec<IndexingFailure>,
}

/// Loader that writes envelopes into the search index.
///
/// Batching and retries are the gateway's business; the loader turns the
/// gateway's per-document results into indexing failures.
pub struct SearchLoader {
    gateway: Arc<SearchIndexClient>,
}

impl SearchLoader {
    /// Create a new search loader over the given gateway.
    pub fn new(gateway: Arc<SearchIndexClient>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<SearchIndexClient> {
        &self.gateway
    }

    /// Bulk upsert a group of envelopes.
    ///
    /// # Returns
    ///
    /// * `Ok(LoadReport)` - Accepted count and per-document failures
    /// * `Err(PipelineError::SearchError)` - If a batch request failed after retries
    #[instrument(skip(self, envelopes), fields(envelope_count = envelopes.len()))]
    pub async fn load(&self, envelopes: Vec<DocumentEnvelope>) -> Result<LoadReport, PipelineError> {
        if envelopes.is_empty() {
            return Ok(LoadReport::default());
        }

        let count = envelopes.len();
        let report = match self.gateway.bulk_upsert(envelopes).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, count, "Failed to load documents");
                return Err(e.into());
            }
        };

        let failures: Vec<IndexingFailure> = report
            .failures()
            .map(|result| {
                let cause = result
                    .error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "rejected by search engine".to_string());
                warn!(
                    index = %result.index,
                    document_id = %result.document_id,
                    cause = %cause,
                    "Document rejected"
                );
                IndexingFailure::for_document(result.document_id.clone(), cause)
            })
            .collect();

        let indexed = report.succeeded();
        debug!(indexed, failed = failures.len(), "Loaded documents");

        Ok(LoadReport { indexed, failures })
    }

    /// Create or replace a single document.
    #[instrument(skip(self, envelope), fields(target = %envelope.target()))]
    pub async fn upsert(&self, envelope: &DocumentEnvelope) -> Result<(), PipelineError> {
        self.gateway
            .upsert(&envelope.target(), &envelope.body)
            .await?;
        debug!("Upserted document");
        Ok(())
    }

    /// Delete a document by identifier from whichever index holds it.
    #[instrument(skip(self))]
    pub async fn delete(&self, document_id: &str) -> Result<DeleteOutcome, PipelineError> {
        Ok(self.gateway.delete(document_id).await?)
    }

    /// Create or update each of the given indices.
    ///
    /// Stops at the first index that cannot be prepared.
    pub async fn prepare_indices(
        &self,
        indices: &[String],
    ) -> Result<Vec<(String, IndexPreparation)>, PipelineError> {
        let mut prepared = Vec::with_capacity(indices.len());

        for index in indices {
            let preparation = self.gateway.prepare_index(index).await?;
            info!(index = %index, preparation = ?preparation, "Prepared index");
            prepared.push((index.clone(), preparation));
        }

        Ok(prepared)
    }

    /// Check if the search engine is healthy.
    pub async fn health_check(&self) -> Result<bool, PipelineError> {
        Ok(self.gateway.health_check().await?)
    }
}
