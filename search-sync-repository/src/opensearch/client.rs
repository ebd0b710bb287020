//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{
        IndicesCreateParts, IndicesExistsParts, IndicesPutSettingsParts, IndicesRefreshParts,
    },
    params::Refresh,
    BulkParts, DeleteByQueryParts, IndexParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::IndexConfig;
use crate::types::{BatchOperationResult, BatchOperationSummary, DeleteOutcome, IndexPreparation};
use search_sync_shared::{CanonicalDocument, DocumentEnvelope, IndexTarget};

/// Number of shard copies that must be active before a write proceeds.
const WAIT_FOR_ACTIVE_SHARDS: &str = "1";

/// Result of a create-index request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CreateOutcome {
    Created,
    /// Another writer created the index first.
    AlreadyExists,
}

/// OpenSearch client implementation.
///
/// # Example
///
/// ```ignore
/// use search_sync_repository::opensearch::{IndexConfig, OpenSearchClient};
///
/// let config = IndexConfig::new("search-", "5m");
/// let client = OpenSearchClient::new("http://localhost:9200", config).await?;
/// client.prepare_index("search-work").await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - Prefix and settings of the managed indices
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            index_prefix = %index_config.index_prefix,
            refresh_interval = %index_config.refresh_interval,
            "Created OpenSearch client"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    /// Request body for a bulk index of `batch`: one action line and one
    /// source line per document.
    fn bulk_body(batch: &[DocumentEnvelope]) -> Vec<JsonBody<Value>> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(batch.len() * 2);
        for envelope in batch {
            body.push(
                json!({"index": {"_index": envelope.index(), "_id": envelope.document_id()}})
                    .into(),
            );
            body.push(envelope.body.clone().into());
        }
        body
    }

    /// Map a bulk response onto the submitted documents.
    ///
    /// Items are positional: the n-th item describes the n-th document.
    fn parse_bulk_response(batch: &[DocumentEnvelope], response: &Value) -> BatchOperationSummary {
        let empty = Vec::new();
        let items = response
            .get("items")
            .and_then(|i| i.as_array())
            .unwrap_or(&empty);

        if items.len() != batch.len() {
            warn!(
                submitted = batch.len(),
                returned = items.len(),
                "Bulk response item count does not match request"
            );
        }

        let results = batch
            .iter()
            .enumerate()
            .map(|(i, envelope)| {
                let item = items.get(i).and_then(|item| item.get("index"));
                match item {
                    None => BatchOperationResult::failed(
                        envelope.index(),
                        envelope.document_id(),
                        SearchIndexError::parse("missing bulk response item"),
                    ),
                    Some(item) => match item.get("error") {
                        Some(error) => BatchOperationResult::failed(
                            envelope.index(),
                            envelope.document_id(),
                            SearchIndexError::index(Self::describe_item_error(error)),
                        ),
                        None => {
                            BatchOperationResult::succeeded(envelope.index(), envelope.document_id())
                        }
                    },
                }
            })
            .collect();

        BatchOperationSummary::from_results(results)
    }

    fn describe_item_error(error: &Value) -> String {
        let kind = error.get("type").and_then(|t| t.as_str());
        let reason = error.get("reason").and_then(|r| r.as_str());
        match (kind, reason) {
            (Some(kind), Some(reason)) => format!("{}: {}", kind, reason),
            (Some(kind), None) => kind.to_string(),
            (None, Some(reason)) => reason.to_string(),
            (None, None) => error.to_string(),
        }
    }

    /// Turn a non-success response into an error. Throttling and gateway
    /// statuses stay retryable; anything else goes through `make`.
    async fn failure(
        response: Response,
        operation: &str,
        make: fn(String) -> SearchIndexError,
    ) -> SearchIndexError {
        let status = response.status_code().as_u16();
        let body = response.text().await.unwrap_or_default();
        error!(status, body = %body, operation, "Request failed");
        Self::status_error(status, body, operation, make)
    }

    fn status_error(
        status: u16,
        body: String,
        operation: &str,
        make: fn(String) -> SearchIndexError,
    ) -> SearchIndexError {
        if matches!(status, 429 | 502 | 503 | 504) {
            SearchIndexError::unexpected_status(status, body)
        } else {
            make(format!("{} failed with status {}: {}", operation, status, body))
        }
    }

    /// Whether an index-exists response found the index.
    fn index_exists(status: u16) -> Result<bool, SearchIndexError> {
        match status {
            200..=299 => Ok(true),
            404 => Ok(false),
            other => Err(Self::status_error(
                other,
                String::new(),
                "Index exists",
                SearchIndexError::IndexCreationError,
            )),
        }
    }

    /// Classify a create-index response.
    fn create_outcome(status: u16, body: String) -> Result<CreateOutcome, SearchIndexError> {
        match status {
            200..=299 => Ok(CreateOutcome::Created),
            400 if body.contains("resource_already_exists_exception") => {
                Ok(CreateOutcome::AlreadyExists)
            }
            other => Err(Self::status_error(
                other,
                body,
                "Create index",
                SearchIndexError::IndexCreationError,
            )),
        }
    }

    /// Make pending writes of the managed indices searchable.
    async fn refresh_managed_indices(&self, pattern: &str) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[pattern]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() && status.as_u16() != 404 {
            return Err(Self::failure(response, "Refresh", SearchIndexError::DeleteError).await);
        }
        Ok(())
    }

    async fn update_refresh_interval(&self, index: &str) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .put_settings(IndicesPutSettingsParts::Index(&[index]))
            .body(self.index_config.refresh_settings_body())
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if !response.status_code().is_success() {
            return Err(
                Self::failure(response, "Update settings", SearchIndexError::IndexCreationError)
                    .await,
            );
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    /// Create or replace a document under its index and identifier.
    ///
    /// A 400 response means the engine rejected this document (for example a
    /// mapping conflict) and is reported as an index error.
    #[instrument(skip(self, document), fields(index = %target.index, document_id = %target.document_id))]
    async fn index_document(
        &self,
        target: &IndexTarget,
        document: &CanonicalDocument,
    ) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .index(IndexParts::IndexId(&target.index, &target.document_id))
            .body(document)
            .wait_for_active_shards(WAIT_FOR_ACTIVE_SHARDS)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let make: fn(String) -> SearchIndexError = if status.as_u16() == 400 {
                SearchIndexError::IndexError
            } else {
                SearchIndexError::BulkOperationError
            };
            return Err(Self::failure(response, "Index", make).await);
        }

        debug!("Document indexed");
        Ok(())
    }

    /// Delete by identifier across every index matching the prefix.
    ///
    /// Delete-by-query only matches refreshed documents, so the managed
    /// indices are refreshed first. A document upserted without refresh is
    /// otherwise missed and stays in the index.
    #[instrument(skip(self))]
    async fn delete_document(&self, document_id: &str) -> Result<DeleteOutcome, SearchIndexError> {
        let pattern = self.index_config.index_pattern();
        self.refresh_managed_indices(&pattern).await?;

        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[pattern.as_str()]))
            .body(json!({
                "query": {
                    "ids": {
                        "values": [document_id]
                    }
                }
            }))
            .wait_for_active_shards(WAIT_FOR_ACTIVE_SHARDS)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        // No managed index yet means nothing to delete.
        if response.status_code().as_u16() == 404 {
            return Ok(DeleteOutcome::NotFound);
        }
        if !response.status_code().is_success() {
            return Err(Self::failure(response, "Delete", SearchIndexError::DeleteError).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        let deleted = body.get("deleted").and_then(|d| d.as_u64()).unwrap_or(0);

        debug!(deleted, "Delete by identifier finished");
        Ok(if deleted == 0 {
            DeleteOutcome::NotFound
        } else {
            DeleteOutcome::Deleted(deleted)
        })
    }

    /// Index a batch with one bulk request, refreshed before returning.
    #[instrument(skip(self, batch), fields(batch_size = batch.len()))]
    async fn bulk_index_documents(
        &self,
        batch: &[DocumentEnvelope],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if batch.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let response = self
            .client
            .bulk(BulkParts::None)
            .body(Self::bulk_body(batch))
            .refresh(Refresh::True)
            .wait_for_active_shards(WAIT_FOR_ACTIVE_SHARDS)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if !response.status_code().is_success() {
            return Err(
                Self::failure(response, "Bulk index", SearchIndexError::BulkOperationError).await,
            );
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        let summary = Self::parse_bulk_response(batch, &body);

        debug!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk index finished"
        );
        Ok(summary)
    }

    #[instrument(skip(self))]
    async fn prepare_index(&self, index: &str) -> Result<IndexPreparation, SearchIndexError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if Self::index_exists(exists.status_code().as_u16())? {
            self.update_refresh_interval(index).await?;
            info!(refresh_interval = %self.index_config.refresh_interval, "Updated index refresh interval");
            return Ok(IndexPreparation::Updated);
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(self.index_config.create_body())
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code().as_u16();
        let body = response.text().await.unwrap_or_default();
        match Self::create_outcome(status, body) {
            Ok(CreateOutcome::Created) => {
                info!("Created index");
                Ok(IndexPreparation::Created)
            }
            Ok(CreateOutcome::AlreadyExists) => {
                self.update_refresh_interval(index).await?;
                info!("Index created concurrently, updated refresh interval");
                Ok(IndexPreparation::Updated)
            }
            Err(e) => {
                error!(status, error = %e, "Create index failed");
                Err(e)
            }
        }
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let health: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        let status = health
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown");

        info!(status, "OpenSearch cluster status");
        Ok(status == "green" || status == "yellow")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    type Route = fn(&str) -> (u16, Value);

    /// Minimal HTTP responder on a local port. Answers each request through
    /// `route` and records its request line.
    async fn serve(route: Route) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                respond(socket, route, &seen).await;
            }
        });
        (url, requests)
    }

    async fn respond(mut socket: TcpStream, route: Route, seen: &Mutex<Vec<String>>) {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];
        let head_end = loop {
            let read = socket.read(&mut chunk).await.unwrap();
            if read == 0 {
                return;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if let Some(at) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break at + 4;
            }
        };

        let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buffer.len() < head_end + length {
            let read = socket.read(&mut chunk).await.unwrap();
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
        }

        let request_line = head.lines().next().unwrap_or_default().to_string();
        let (status, body) = route(&request_line);
        seen.lock().unwrap().push(request_line);

        let body = body.to_string();
        let response = format!(
            "HTTP/1.1 {} Status\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
    }

    async fn client(url: &str) -> OpenSearchClient {
        OpenSearchClient::new(url, IndexConfig::new("search-", "5m"))
            .await
            .unwrap()
    }

    fn acknowledged() -> Value {
        json!({"acknowledged": true, "_shards": {"total": 1, "successful": 1, "failed": 0}})
    }

    fn already_exists() -> Value {
        json!({"error": {"type": "resource_already_exists_exception", "reason": "index [search-work] already exists"}, "status": 400})
    }

    fn envelope(index: &str, id: &str, body: Value) -> DocumentEnvelope {
        DocumentEnvelope::new(IndexTarget::new(index, id), body)
    }

    #[test]
    fn test_bulk_body_pairs_actions_with_sources() {
        let batch = vec![
            envelope("search-work", "w1", json!({"title": "One"})),
            envelope("search-collection", "c1", json!({"title": "Two"})),
        ];

        let body = OpenSearchClient::bulk_body(&batch);
        assert_eq!(body.len(), 4);
    }

    #[test]
    fn test_parse_bulk_response_all_succeeded() {
        let batch = vec![
            envelope("search-work", "w1", json!({})),
            envelope("search-work", "w2", json!({})),
        ];
        let response = json!({
            "errors": false,
            "items": [
                {"index": {"_index": "search-work", "_id": "w1", "status": 201}},
                {"index": {"_index": "search-work", "_id": "w2", "status": 200}}
            ]
        });

        let summary = OpenSearchClient::parse_bulk_response(&batch, &response);

        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_parse_bulk_response_partial_failure() {
        let batch = vec![
            envelope("search-work", "w1", json!({})),
            envelope("search-work", "w2", json!({})),
        ];
        let response = json!({
            "errors": true,
            "items": [
                {"index": {"_id": "w1", "status": 400, "error": {
                    "type": "mapper_parsing_exception",
                    "reason": "failed to parse field [year]"
                }}},
                {"index": {"_id": "w2", "status": 201}}
            ]
        });

        let summary = OpenSearchClient::parse_bulk_response(&batch, &response);

        assert_eq!(summary.failed, 1);
        let failure = &summary.results[0];
        assert_eq!(failure.document_id, "w1");
        assert_eq!(
            failure.error,
            Some(SearchIndexError::index(
                "mapper_parsing_exception: failed to parse field [year]"
            ))
        );
        assert!(summary.results[1].success);
    }

    #[test]
    fn test_parse_bulk_response_missing_items() {
        let batch = vec![envelope("search-work", "w1", json!({}))];

        let summary = OpenSearchClient::parse_bulk_response(&batch, &json!({}));

        assert_eq!(summary.failed, 1);
        assert!(matches!(
            summary.results[0].error,
            Some(SearchIndexError::ParseError(_))
        ));
    }

    #[test]
    fn test_index_exists_status() {
        assert!(OpenSearchClient::index_exists(200).unwrap());
        assert!(!OpenSearchClient::index_exists(404).unwrap());
        assert!(OpenSearchClient::index_exists(503).unwrap_err().is_retryable());
        assert!(matches!(
            OpenSearchClient::index_exists(403),
            Err(SearchIndexError::IndexCreationError(_))
        ));
    }

    #[test]
    fn test_create_outcome() {
        assert_eq!(
            OpenSearchClient::create_outcome(200, String::new()).unwrap(),
            CreateOutcome::Created
        );
        assert_eq!(
            OpenSearchClient::create_outcome(400, already_exists().to_string()).unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert!(matches!(
            OpenSearchClient::create_outcome(400, r#"{"error":"invalid_index_name_exception"}"#.into()),
            Err(SearchIndexError::IndexCreationError(_))
        ));
        assert!(OpenSearchClient::create_outcome(429, String::new())
            .unwrap_err()
            .is_retryable());
    }

    #[tokio::test]
    async fn test_prepare_creates_missing_index() {
        let (url, requests) = serve(|line| match line {
            l if l.starts_with("HEAD") => (404, json!({})),
            _ => (200, acknowledged()),
        })
        .await;

        let preparation = client(&url).await.prepare_index("search-work").await.unwrap();

        assert_eq!(preparation, IndexPreparation::Created);
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].starts_with("PUT /search-work "));
    }

    #[tokio::test]
    async fn test_prepare_existing_index_updates_settings() {
        let (url, requests) = serve(|_| (200, acknowledged())).await;

        let preparation = client(&url).await.prepare_index("search-work").await.unwrap();

        assert_eq!(preparation, IndexPreparation::Updated);
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].contains("/search-work/_settings"));
    }

    #[tokio::test]
    async fn test_prepare_concurrently_created_index_updates_settings() {
        let (url, requests) = serve(|line| match line {
            l if l.starts_with("HEAD") => (404, json!({})),
            l if l.contains("_settings") => (200, acknowledged()),
            _ => (400, already_exists()),
        })
        .await;

        let preparation = client(&url).await.prepare_index("search-work").await.unwrap();

        assert_eq!(preparation, IndexPreparation::Updated);
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].contains("/search-work/_settings"));
    }

    #[tokio::test]
    async fn test_delete_refreshes_before_matching() {
        let (url, requests) = serve(|line| {
            if line.contains("_delete_by_query") {
                (200, json!({"deleted": 1, "failures": []}))
            } else {
                (200, json!({"_shards": {"total": 1, "successful": 1, "failed": 0}}))
            }
        })
        .await;

        let outcome = client(&url).await.delete_document("w1").await.unwrap();

        assert_eq!(outcome, DeleteOutcome::Deleted(1));
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].contains("/_refresh"));
        assert!(requests[1].contains("/_delete_by_query"));
    }

    #[tokio::test]
    async fn test_delete_without_managed_indices_is_not_found() {
        let (url, _requests) = serve(|_| (404, json!({"error": "index_not_found_exception"}))).await;

        let outcome = client(&url).await.delete_document("w1").await.unwrap();

        assert_eq!(outcome, DeleteOutcome::NotFound);
    }
}
