//! Search index client implementation.
//!
//! This module provides the indexing gateway. Application code uses it to
//! upsert and delete documents; it validates targets, splits bulk writes into
//! batches and retries transient engine failures.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::config::SearchIndexConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{BatchOperationResult, BulkUpsertReport, DeleteOutcome, IndexPreparation};
use search_sync_shared::{CanonicalDocument, DocumentEnvelope, IndexTarget};

/// The main client for writing to the search index.
pub struct SearchIndexClient {
    provider: Box<dyn SearchIndexProvider>,
    config: SearchIndexConfig,
}

impl SearchIndexClient {
    /// Create a new SearchIndexClient with default configuration.
    pub fn new(provider: Box<dyn SearchIndexProvider>) -> Self {
        Self {
            provider,
            config: SearchIndexConfig::default(),
        }
    }

    /// Create a new SearchIndexClient with custom configuration.
    pub fn with_config(provider: Box<dyn SearchIndexProvider>, config: SearchIndexConfig) -> Self {
        Self { provider, config }
    }

    /// The configured bulk batch size.
    pub fn batch_size(&self) -> usize {
        self.config.max_batch_size
    }

    fn validate_target(index: &str, document_id: &str) -> Result<(), SearchIndexError> {
        if index.is_empty() {
            return Err(SearchIndexError::validation("index is required"));
        }
        if document_id.is_empty() {
            return Err(SearchIndexError::validation("document_id is required"));
        }
        Ok(())
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error or
    /// runs out of retries, backing off exponentially in between.
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &str,
        mut attempt_fn: F,
    ) -> Result<T, SearchIndexError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SearchIndexError>>,
    {
        let retry = &self.config.retry;
        let mut delay_ms = retry.initial_retry_delay_ms;
        let mut attempt = 0;

        loop {
            match attempt_fn().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(attempt, operation, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = retry.max_retries,
                        delay_ms,
                        operation,
                        error = %e,
                        "Search engine request failed, retrying"
                    );

                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = std::cmp::min(delay_ms * 2, retry.max_retry_delay_ms);
                }
                Err(e) => {
                    debug!(operation, error = %e, retryable = e.is_retryable(), "Giving up");
                    return Err(e);
                }
            }
        }
    }

    /// Create or replace a single document.
    ///
    /// # Arguments
    ///
    /// * `target` - Index and identifier; both must be non-empty
    /// * `document` - The document body
    #[instrument(skip(self, target, document), fields(target = %target))]
    pub async fn upsert(
        &self,
        target: &IndexTarget,
        document: &CanonicalDocument,
    ) -> Result<(), SearchIndexError> {
        Self::validate_target(&target.index, &target.document_id)?;

        self.with_retry("index", || self.provider.index_document(target, document))
            .await
    }

    /// Delete the document with `document_id` from whichever index holds it.
    ///
    /// A document that does not exist is not an error.
    #[instrument(skip(self))]
    pub async fn delete(&self, document_id: &str) -> Result<DeleteOutcome, SearchIndexError> {
        if document_id.is_empty() {
            return Err(SearchIndexError::validation("document_id is required"));
        }

        let outcome = self
            .with_retry("delete", || self.provider.delete_document(document_id))
            .await?;

        if outcome == DeleteOutcome::NotFound {
            info!("Document to delete was not found in any index");
        }
        Ok(outcome)
    }

    /// Create or replace many documents.
    ///
    /// Documents with an incomplete target are rejected without being sent.
    /// The rest are written in consecutive batches of at most
    /// `max_batch_size`, one engine call per batch. A rejected document does
    /// not affect the others; a failed batch request aborts the remaining
    /// batches.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkUpsertReport)` - Per-batch summaries and pre-submission rejections
    /// * `Err(SearchIndexError)` - If a batch request fails after retries
    #[instrument(skip(self, documents), fields(documents = documents.len()))]
    pub async fn bulk_upsert(
        &self,
        documents: Vec<DocumentEnvelope>,
    ) -> Result<BulkUpsertReport, SearchIndexError> {
        let mut report = BulkUpsertReport::default();
        let mut valid = Vec::with_capacity(documents.len());

        for envelope in documents {
            match Self::validate_target(envelope.index(), envelope.document_id()) {
                Ok(()) => valid.push(envelope),
                Err(e) => report.rejected.push(BatchOperationResult::failed(
                    envelope.index(),
                    envelope.document_id(),
                    e,
                )),
            }
        }

        for (number, batch) in valid.chunks(self.config.max_batch_size.max(1)).enumerate() {
            let summary = self
                .with_retry("bulk index", || self.provider.bulk_index_documents(batch))
                .await?;

            debug!(
                batch = number + 1,
                size = batch.len(),
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Batch indexed"
            );
            report.batches.push(summary);
        }

        Ok(report)
    }

    /// Create the index if missing, otherwise apply the configured refresh
    /// interval to it.
    pub async fn prepare_index(&self, index: &str) -> Result<IndexPreparation, SearchIndexError> {
        if index.is_empty() {
            return Err(SearchIndexError::validation("index is required"));
        }

        self.with_retry("prepare index", || self.provider.prepare_index(index))
            .await
    }

    /// Whether the search engine is able to serve writes.
    pub async fn health_check(&self) -> Result<bool, SearchIndexError> {
        self.with_retry("health check", || self.provider.health_check())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::types::BatchOperationSummary;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records calls; rejects documents whose id is in `reject_ids`; fails the
    /// first `transient_failures` calls with `failure`.
    #[derive(Default)]
    struct MockState {
        bulk_calls: Mutex<Vec<usize>>,
        index_calls: AtomicU32,
        delete_calls: AtomicU32,
        reject_ids: HashSet<String>,
        existing_ids: HashSet<String>,
        transient_failures: AtomicU32,
        failure: Option<SearchIndexError>,
    }

    struct MockProvider {
        state: Arc<MockState>,
    }

    impl MockProvider {
        fn take_failure(&self) -> Option<SearchIndexError> {
            let remaining = self.state.transient_failures.load(Ordering::SeqCst);
            if remaining == 0 {
                return None;
            }
            self.state
                .transient_failures
                .store(remaining - 1, Ordering::SeqCst);
            self.state.failure.clone()
        }
    }

    #[async_trait]
    impl SearchIndexProvider for MockProvider {
        async fn index_document(
            &self,
            _target: &IndexTarget,
            _document: &CanonicalDocument,
        ) -> Result<(), SearchIndexError> {
            self.state.index_calls.fetch_add(1, Ordering::SeqCst);
            match self.take_failure() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        async fn delete_document(
            &self,
            document_id: &str,
        ) -> Result<DeleteOutcome, SearchIndexError> {
            self.state.delete_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(e) = self.take_failure() {
                return Err(e);
            }
            if self.state.existing_ids.contains(document_id) {
                Ok(DeleteOutcome::Deleted(1))
            } else {
                Ok(DeleteOutcome::NotFound)
            }
        }

        async fn bulk_index_documents(
            &self,
            batch: &[DocumentEnvelope],
        ) -> Result<BatchOperationSummary, SearchIndexError> {
            self.state.bulk_calls.lock().unwrap().push(batch.len());
            if let Some(e) = self.take_failure() {
                return Err(e);
            }

            let results = batch
                .iter()
                .map(|envelope| {
                    if self.state.reject_ids.contains(envelope.document_id()) {
                        BatchOperationResult::failed(
                            envelope.index(),
                            envelope.document_id(),
                            SearchIndexError::index("mapper_parsing_exception"),
                        )
                    } else {
                        BatchOperationResult::succeeded(envelope.index(), envelope.document_id())
                    }
                })
                .collect();
            Ok(BatchOperationSummary::from_results(results))
        }

        async fn prepare_index(&self, _index: &str) -> Result<IndexPreparation, SearchIndexError> {
            Ok(IndexPreparation::Created)
        }

        async fn health_check(&self) -> Result<bool, SearchIndexError> {
            Ok(true)
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_retry_delay_ms: 1,
            max_retry_delay_ms: 2,
        }
    }

    fn client_with(state: MockState, batch_size: usize) -> (SearchIndexClient, Arc<MockState>) {
        let state = Arc::new(state);
        let provider = MockProvider {
            state: state.clone(),
        };
        let config = SearchIndexConfig::with_max_batch_size(batch_size).with_retry(fast_retry());
        (SearchIndexClient::with_config(Box::new(provider), config), state)
    }

    fn envelopes(count: usize) -> Vec<DocumentEnvelope> {
        (0..count)
            .map(|i| {
                DocumentEnvelope::new(
                    IndexTarget::new("search-work", format!("w{}", i)),
                    json!({"id": format!("w{}", i), "status": "published"}),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_bulk_upsert_partitions_into_batches() {
        let (client, state) = client_with(MockState::default(), 100);

        let report = client.bulk_upsert(envelopes(250)).await.unwrap();

        assert_eq!(*state.bulk_calls.lock().unwrap(), vec![100, 100, 50]);
        assert_eq!(report.batches.len(), 3);
        assert_eq!(report.succeeded(), 250);
        assert_eq!(report.failures().count(), 0);
    }

    #[tokio::test]
    async fn test_bulk_upsert_exact_multiple() {
        let (client, state) = client_with(MockState::default(), 100);

        client.bulk_upsert(envelopes(200)).await.unwrap();

        assert_eq!(*state.bulk_calls.lock().unwrap(), vec![100, 100]);
    }

    #[tokio::test]
    async fn test_bulk_upsert_empty() {
        let (client, state) = client_with(MockState::default(), 100);

        let report = client.bulk_upsert(Vec::new()).await.unwrap();

        assert!(state.bulk_calls.lock().unwrap().is_empty());
        assert_eq!(report, BulkUpsertReport::default());
    }

    #[tokio::test]
    async fn test_bulk_upsert_isolates_rejected_documents() {
        let state = MockState {
            reject_ids: ["w3".to_string()].into_iter().collect(),
            ..MockState::default()
        };
        let (client, _) = client_with(state, 100);

        let report = client.bulk_upsert(envelopes(5)).await.unwrap();

        assert_eq!(report.succeeded(), 4);
        let failed: Vec<&str> = report.failures().map(|r| r.document_id.as_str()).collect();
        assert_eq!(failed, vec!["w3"]);
    }

    #[tokio::test]
    async fn test_bulk_upsert_rejects_incomplete_target_before_submission() {
        let (client, state) = client_with(MockState::default(), 100);
        let mut documents = envelopes(2);
        documents.push(DocumentEnvelope::new(
            IndexTarget::new("search-work", ""),
            json!({"status": "published"}),
        ));

        let report = client.bulk_upsert(documents).await.unwrap();

        assert_eq!(*state.bulk_calls.lock().unwrap(), vec![2]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(
            report.rejected[0].error,
            Some(SearchIndexError::validation("document_id is required"))
        );
    }

    #[tokio::test]
    async fn test_bulk_upsert_retries_transient_failure() {
        let state = MockState {
            transient_failures: AtomicU32::new(2),
            failure: Some(SearchIndexError::unexpected_status(429, "too many requests")),
            ..MockState::default()
        };
        let (client, state) = client_with(state, 100);

        let report = client.bulk_upsert(envelopes(3)).await.unwrap();

        assert_eq!(*state.bulk_calls.lock().unwrap(), vec![3, 3, 3]);
        assert_eq!(report.succeeded(), 3);
    }

    #[tokio::test]
    async fn test_bulk_upsert_gives_up_after_max_retries() {
        let state = MockState {
            transient_failures: AtomicU32::new(10),
            failure: Some(SearchIndexError::connection("refused")),
            ..MockState::default()
        };
        let (client, state) = client_with(state, 100);

        let result = client.bulk_upsert(envelopes(3)).await;

        assert_eq!(result, Err(SearchIndexError::connection("refused")));
        // One attempt plus three retries.
        assert_eq!(state.bulk_calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_is_not_retried() {
        let state = MockState {
            transient_failures: AtomicU32::new(1),
            failure: Some(SearchIndexError::bulk_operation("status 400")),
            ..MockState::default()
        };
        let (client, state) = client_with(state, 100);

        assert!(client.bulk_upsert(envelopes(1)).await.is_err());
        assert_eq!(state.bulk_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_validation() {
        let (client, state) = client_with(MockState::default(), 100);

        let result = client
            .upsert(&IndexTarget::new("", "w1"), &json!({}))
            .await;
        assert_eq!(result, Err(SearchIndexError::validation("index is required")));

        let result = client
            .upsert(&IndexTarget::new("search-work", ""), &json!({}))
            .await;
        assert_eq!(
            result,
            Err(SearchIndexError::validation("document_id is required"))
        );

        assert_eq!(state.index_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upsert_success() {
        let (client, state) = client_with(MockState::default(), 100);

        client
            .upsert(&IndexTarget::new("search-work", "w1"), &json!({"id": "w1"}))
            .await
            .unwrap();

        assert_eq!(state.index_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delete_found_and_not_found() {
        let state = MockState {
            existing_ids: ["w1".to_string()].into_iter().collect(),
            ..MockState::default()
        };
        let (client, _) = client_with(state, 100);

        assert_eq!(client.delete("w1").await, Ok(DeleteOutcome::Deleted(1)));
        assert_eq!(client.delete("w2").await, Ok(DeleteOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_delete_validation() {
        let (client, state) = client_with(MockState::default(), 100);

        assert_eq!(
            client.delete("").await,
            Err(SearchIndexError::validation("document_id is required"))
        );
        assert_eq!(state.delete_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_batch_size_uses_default() {
        let (client, _) = client_with(MockState::default(), 0);
        assert_eq!(client.batch_size(), 100);
    }
}
