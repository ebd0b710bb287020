//! Change-stream synchronization.
//!
//! Applies the action decided for each notification of a stream batch to the
//! search index.

use tracing::{debug, error, info, instrument, warn};

use crate::errors::PipelineError;
use crate::loader::SearchLoader;
use crate::processor::{DocumentProcessor, StreamProcessor, SyncAction};
use search_sync_repository::DeleteOutcome;
use search_sync_shared::{ErrorKind, IndexTarget, StreamBatch, StreamNotification, STREAM_SUCCESS};

/// What applying one notification did.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// The new image was written to this target.
    Upserted(IndexTarget),
    /// A delete by identifier ran.
    Deleted(DeleteOutcome),
    /// The notification required no change.
    Ignored,
}

/// Counts for one stream batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub upserted: usize,
    pub deleted: usize,
    /// Deletes of documents that were not indexed.
    pub not_found: usize,
    pub ignored: usize,
    /// Notifications that were logged and skipped.
    pub failed: usize,
}

impl StreamSummary {
    /// Token returned to the invoking runtime.
    pub fn status(&self) -> &'static str {
        STREAM_SUCCESS
    }

    fn record(&mut self, applied: &Applied) {
        match applied {
            Applied::Upserted(_) => self.upserted += 1,
            Applied::Deleted(DeleteOutcome::Deleted(_)) => self.deleted += 1,
            Applied::Deleted(DeleteOutcome::NotFound) => self.not_found += 1,
            Applied::Ignored => self.ignored += 1,
        }
    }
}

/// Keeps the index in step with the change stream.
pub struct StreamSynchronizer {
    processor: StreamProcessor,
    documents: DocumentProcessor,
    loader: SearchLoader,
}

impl StreamSynchronizer {
    /// Create a new stream synchronizer.
    ///
    /// # Arguments
    ///
    /// * `processor` - Decides the action for each notification
    /// * `documents` - Resolves the target of upserted images
    /// * `loader` - Writes to the search index
    pub fn new(processor: StreamProcessor, documents: DocumentProcessor, loader: SearchLoader) -> Self {
        Self {
            processor,
            documents,
            loader,
        }
    }

    /// Decide and apply the action for one notification.
    ///
    /// # Returns
    ///
    /// * `Ok(Applied)` - What was written, if anything
    /// * `Err(PipelineError)` - If the notification is unusable or the write failed
    #[instrument(skip(self, notification), fields(event = notification.log_id()))]
    pub async fn handle_notification(
        &self,
        notification: &StreamNotification,
    ) -> Result<Applied, PipelineError> {
        match self.processor.decide(notification)? {
            SyncAction::Upsert(document) => {
                let envelope = self.documents.process(document)?;
                self.loader.upsert(&envelope).await?;
                Ok(Applied::Upserted(envelope.target()))
            }
            SyncAction::Delete(document_id) => {
                let outcome = self.loader.delete(&document_id).await?;
                Ok(Applied::Deleted(outcome))
            }
            SyncAction::Ignore => Ok(Applied::Ignored),
        }
    }

    /// Apply every notification of a batch in order.
    ///
    /// A notification that is malformed, cannot be decoded or is rejected by
    /// the engine is logged and skipped. An infrastructure failure stops the
    /// batch so the runtime redelivers it.
    ///
    /// # Returns
    ///
    /// * `Ok(StreamSummary)` - Counts of the processed batch
    /// * `Err(PipelineError)` - If the search engine is unreachable
    #[instrument(skip(self, batch), fields(record_count = batch.records.len()))]
    pub async fn handle_batch(&self, batch: &StreamBatch) -> Result<StreamSummary, PipelineError> {
        let mut summary = StreamSummary::default();

        for (position, converted) in batch.notifications().enumerate() {
            let notification = match converted {
                Ok(notification) => notification,
                Err(e) => {
                    warn!(position, error = %e, "Skipping malformed notification");
                    summary.failed += 1;
                    continue;
                }
            };

            match self.handle_notification(&notification).await {
                Ok(applied) => {
                    debug!(event = notification.log_id(), applied = ?applied, "Applied notification");
                    summary.record(&applied);
                }
                Err(e) if e.kind() == ErrorKind::Infrastructure => {
                    error!(event = notification.log_id(), error = %e, "Stream batch aborted");
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        event = notification.log_id(),
                        kind = ?e.kind(),
                        error = %e,
                        "Skipping notification"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            upserted = summary.upserted,
            deleted = summary.deleted,
            not_found = summary.not_found,
            ignored = summary.ignored,
            failed = summary.failed,
            "Stream batch processed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::PublicationFilter;
    use async_trait::async_trait;
    use search_sync_repository::{
        BatchOperationSummary, IndexPreparation, RetryConfig, SearchIndexClient,
        SearchIndexConfig, SearchIndexError, SearchIndexProvider,
    };
    use search_sync_shared::{CanonicalDocument, DocumentEnvelope};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory index keyed by document id. Fails every call when
    /// `unavailable` is set.
    #[derive(Default)]
    struct MockProvider {
        documents: Arc<Mutex<HashMap<String, (String, CanonicalDocument)>>>,
        unavailable: bool,
    }

    impl MockProvider {
        fn check(&self) -> Result<(), SearchIndexError> {
            if self.unavailable {
                return Err(SearchIndexError::connection("connection refused"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SearchIndexProvider for MockProvider {
        async fn index_document(
            &self,
            target: &IndexTarget,
            document: &CanonicalDocument,
        ) -> Result<(), SearchIndexError> {
            self.check()?;
            self.documents.lock().unwrap().insert(
                target.document_id.clone(),
                (target.index.clone(), document.clone()),
            );
            Ok(())
        }

        async fn delete_document(&self, document_id: &str) -> Result<DeleteOutcome, SearchIndexError> {
            self.check()?;
            match self.documents.lock().unwrap().remove(document_id) {
                Some(_) => Ok(DeleteOutcome::Deleted(1)),
                None => Ok(DeleteOutcome::NotFound),
            }
        }

        async fn bulk_index_documents(
            &self,
            _batch: &[DocumentEnvelope],
        ) -> Result<BatchOperationSummary, SearchIndexError> {
            self.check()?;
            Ok(BatchOperationSummary::default())
        }

        async fn prepare_index(&self, _index: &str) -> Result<IndexPreparation, SearchIndexError> {
            Ok(IndexPreparation::Created)
        }

        async fn health_check(&self) -> Result<bool, SearchIndexError> {
            Ok(!self.unavailable)
        }
    }

    type Index = Arc<Mutex<HashMap<String, (String, CanonicalDocument)>>>;

    fn synchronizer(provider: MockProvider) -> (StreamSynchronizer, Index) {
        let documents = provider.documents.clone();
        let gateway = SearchIndexClient::with_config(
            Box::new(provider),
            SearchIndexConfig::default().with_retry(RetryConfig::none()),
        );
        let synchronizer = StreamSynchronizer::new(
            StreamProcessor::new(PublicationFilter::default(), "id"),
            DocumentProcessor::default(),
            SearchLoader::new(Arc::new(gateway)),
        );
        (synchronizer, documents)
    }

    fn image(id: &str, status: &str) -> Value {
        json!({
            "id": {"S": id},
            "type": {"S": "Work"},
            "status": {"S": status},
            "title": {"S": "A title"}
        })
    }

    fn record(event: &str, id: &str, old: Option<Value>, new: Option<Value>) -> Value {
        let mut images = json!({"Keys": {"id": {"S": id}}});
        if let Some(old) = old {
            images["OldImage"] = old;
        }
        if let Some(new) = new {
            images["NewImage"] = new;
        }
        json!({"eventID": format!("{}-{}", event, id), "eventName": event, "dynamodb": images})
    }

    fn batch(records: Vec<Value>) -> StreamBatch {
        StreamBatch::from_payload(&json!({ "Records": records }).to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_publish_unpublish_lifecycle() {
        let (synchronizer, index) = synchronizer(MockProvider::default());

        let summary = synchronizer
            .handle_batch(&batch(vec![
                record("INSERT", "w1", None, Some(image("w1", "draft"))),
                record("MODIFY", "w1", Some(image("w1", "draft")), Some(image("w1", "published"))),
            ]))
            .await
            .unwrap();
        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.upserted, 1);
        assert_eq!(summary.status(), "Success");

        let stored = index.lock().unwrap().get("w1").cloned().unwrap();
        assert_eq!(stored.0, "search-work");
        assert_eq!(stored.1["title"], json!("A title"));

        let summary = synchronizer
            .handle_batch(&batch(vec![record(
                "MODIFY",
                "w1",
                Some(image("w1", "published")),
                Some(image("w1", "draft")),
            )]))
            .await
            .unwrap();
        assert_eq!(summary.deleted, 1);
        assert!(index.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replayed_batch_is_idempotent() {
        let (synchronizer, index) = synchronizer(MockProvider::default());
        let records = batch(vec![
            record("INSERT", "w1", None, Some(image("w1", "published"))),
            record("INSERT", "w2", None, Some(image("w2", "published"))),
            record("REMOVE", "w2", Some(image("w2", "published")), None),
        ]);

        let first = synchronizer.handle_batch(&records).await.unwrap();
        let snapshot = index.lock().unwrap().clone();
        let second = synchronizer.handle_batch(&records).await.unwrap();

        assert_eq!(first.deleted, 1);
        assert_eq!(second.upserted, 2);
        assert_eq!(*index.lock().unwrap(), snapshot);
        assert!(snapshot.contains_key("w1"));
        assert!(!snapshot.contains_key("w2"));
    }

    #[tokio::test]
    async fn test_remove_of_unindexed_document_is_not_found() {
        let (synchronizer, _index) = synchronizer(MockProvider::default());

        let summary = synchronizer
            .handle_batch(&batch(vec![record("REMOVE", "w9", None, None)]))
            .await
            .unwrap();

        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_bad_records_are_skipped() {
        let (synchronizer, index) = synchronizer(MockProvider::default());

        let mut untyped = image("w3", "published");
        untyped.as_object_mut().unwrap().remove("type");

        let summary = synchronizer
            .handle_batch(&batch(vec![
                json!({"eventName": "TRUNCATE", "dynamodb": {"Keys": {"id": {"S": "w0"}}}}),
                record("INSERT", "w1", None, None),
                record("INSERT", "w2", None, Some(json!({"status": {"S": "published"}, "x": {}}))),
                record("INSERT", "w3", None, Some(untyped)),
                record("INSERT", "w4", None, Some(image("w4", "published"))),
            ]))
            .await
            .unwrap();

        assert_eq!(summary.failed, 4);
        assert_eq!(summary.upserted, 1);
        assert!(index.lock().unwrap().contains_key("w4"));
    }

    #[tokio::test]
    async fn test_malformed_record_does_not_fail_batch() {
        let (synchronizer, index) = synchronizer(MockProvider::default());
        let mut broken = record("INSERT", "w1", None, None);
        broken["dynamodb"]["NewImage"] = json!("oops");
        let mut numbered = record("MODIFY", "w2", None, Some(image("w2", "published")));
        numbered["eventName"] = json!(2);

        let summary = synchronizer
            .handle_batch(&batch(vec![
                broken,
                numbered,
                record("INSERT", "w3", None, Some(image("w3", "published"))),
            ]))
            .await
            .unwrap();

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.upserted, 1);
        let index = index.lock().unwrap();
        assert!(index.contains_key("w3"));
        assert!(!index.contains_key("w1"));
    }

    #[tokio::test]
    async fn test_unreachable_engine_aborts_batch() {
        let (synchronizer, _index) = synchronizer(MockProvider {
            unavailable: true,
            ..Default::default()
        });

        let result = synchronizer
            .handle_batch(&batch(vec![
                record("INSERT", "w1", None, Some(image("w1", "published"))),
                record("INSERT", "w2", None, Some(image("w2", "published"))),
            ]))
            .await;

        assert!(matches!(result, Err(PipelineError::SearchError(_))));
    }

    #[tokio::test]
    async fn test_handle_notification_reports_target() {
        let (synchronizer, _index) = synchronizer(MockProvider::default());
        let notification = StreamNotification::new(
            "INSERT",
            serde_json::from_value(json!({"id": {"S": "w1"}})).unwrap(),
            None,
            serde_json::from_value(image("w1", "Published")).unwrap(),
        );

        let applied = synchronizer.handle_notification(&notification).await.unwrap();

        assert_eq!(applied, Applied::Upserted(IndexTarget::new("search-work", "w1")));
    }
}
