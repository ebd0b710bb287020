//! Dependency initialization and wiring for the synchronizer.

use std::sync::Arc;
use tracing::info;

use crate::config::Settings;
use crate::SyncError;
use search_sync_pipeline::{
    ContinuationController, ContinuationEmitter, DocumentProcessor, ExtractionPipeline,
    ObjectStoreBackend, SearchLoader, StorageBackend, StreamProcessor, StreamSynchronizer,
};
use search_sync_repository::{OpenSearchClient, SearchIndexClient};
use search_sync_shared::ImportJob;

/// Container for all initialized dependencies.
pub struct Dependencies {
    settings: Settings,
    gateway: Arc<SearchIndexClient>,
}

impl Dependencies {
    /// Initialize the search engine client from `settings`.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(SyncError)` - If the client cannot be created
    pub async fn new(settings: Settings) -> Result<Self, SyncError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            index_prefix = %settings.index_prefix,
            batch_size = settings.batch_size,
            max_files = settings.max_files,
            "Initializing dependencies"
        );

        let search_client = OpenSearchClient::new(&settings.opensearch_url, settings.index_config())
            .await
            .map_err(|e| SyncError::config(format!("Failed to create OpenSearch client: {}", e)))?;

        let gateway = SearchIndexClient::with_config(
            Box::new(search_client),
            settings.search_index_config(),
        );

        Ok(Self::with_gateway(settings, Arc::new(gateway)))
    }

    /// Wire dependencies around an existing gateway.
    pub fn with_gateway(settings: Settings, gateway: Arc<SearchIndexClient>) -> Self {
        Self { settings, gateway }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Fail unless the search cluster is able to serve writes.
    pub async fn verify_search_health(&self) -> Result<(), SyncError> {
        let healthy = self
            .gateway
            .health_check()
            .await
            .map_err(|e| SyncError::config(format!("OpenSearch health check failed: {}", e)))?;

        if !healthy {
            return Err(SyncError::config("OpenSearch cluster is unhealthy"));
        }

        info!("OpenSearch connection verified");
        Ok(())
    }

    pub fn loader(&self) -> SearchLoader {
        SearchLoader::new(self.gateway.clone())
    }

    /// Storage backend serving `scheme`.
    pub fn storage(&self, scheme: &str) -> Result<Arc<dyn StorageBackend>, SyncError> {
        let backend = ObjectStoreBackend::for_scheme(scheme, &self.settings.local_storage_root)?;
        Ok(Arc::new(backend))
    }

    /// Extraction pipeline for exports stored under `scheme`.
    pub fn extraction(&self, scheme: &str) -> Result<ExtractionPipeline, SyncError> {
        Ok(ExtractionPipeline::new(
            self.storage(scheme)?,
            self.settings.publication_filter(),
        ))
    }

    /// Controller for the invocations of `job`, emitting continuations
    /// through `emitter`.
    pub fn migration(
        &self,
        job: &ImportJob,
        emitter: Arc<dyn ContinuationEmitter>,
    ) -> Result<ContinuationController, SyncError> {
        Ok(ContinuationController::new(
            self.extraction(&job.location.scheme)?,
            DocumentProcessor::new(self.settings.target_config()),
            self.loader(),
            emitter,
            self.settings.continuation_config(),
        )?)
    }

    pub fn stream_synchronizer(&self) -> StreamSynchronizer {
        StreamSynchronizer::new(
            StreamProcessor::new(self.settings.publication_filter(), self.settings.id_field.clone()),
            DocumentProcessor::new(self.settings.target_config()),
            self.loader(),
        )
    }
}
