//! Settings read from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::SyncError;
use search_sync_pipeline::{ContinuationConfig, PublicationFilter, TargetConfig};
use search_sync_repository::{IndexConfig, RetryConfig, SearchIndexConfig};

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default record types whose indices `prepare-index` manages.
const DEFAULT_DOCUMENT_TYPES: &str = "work,collection,file_set";

/// Runtime settings of the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub opensearch_url: String,
    pub index_prefix: String,
    /// Record types whose indices are prepared.
    pub document_types: Vec<String>,
    pub type_field: String,
    pub id_field: String,
    pub status_field: String,
    pub published_value: String,
    pub batch_size: usize,
    pub refresh_interval: String,
    /// Export files per migration invocation.
    pub max_files: usize,
    pub max_retries: u32,
    pub retry_initial_ms: u64,
    pub retry_max_ms: u64,
    /// Root directory of `file://` locations.
    pub local_storage_root: PathBuf,
}

impl Settings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `SEARCH_INDEX_PREFIX`: Prefix of every index name (default: search-)
    /// - `SEARCH_DOCUMENT_TYPES`: Comma-separated record types (default: work,collection,file_set)
    /// - `SEARCH_TYPE_FIELD` / `SEARCH_ID_FIELD`: Target fields (default: type / id)
    /// - `SEARCH_STATUS_FIELD` / `SEARCH_PUBLISHED_VALUE`: Publication filter (default: status / published)
    /// - `SEARCH_BATCH_SIZE`: Documents per bulk request (default: 100)
    /// - `SEARCH_REFRESH_INTERVAL`: Refresh interval of prepared indices (default: 5m)
    /// - `MIGRATION_MAX_FILES`: Export files per invocation (default: 100)
    /// - `SEARCH_MAX_RETRIES`, `SEARCH_RETRY_INITIAL_MS`, `SEARCH_RETRY_MAX_MS`: Retry policy (default: 3, 100, 5000)
    /// - `LOCAL_STORAGE_ROOT`: Root of `file://` locations (default: .)
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through `lookup`, which returns the value of a variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str, default: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let retry_defaults = RetryConfig::default();

        let settings = Self {
            opensearch_url: text("OPENSEARCH_URL", DEFAULT_OPENSEARCH_URL),
            index_prefix: text("SEARCH_INDEX_PREFIX", "search-"),
            document_types: text("SEARCH_DOCUMENT_TYPES", DEFAULT_DOCUMENT_TYPES)
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            type_field: text("SEARCH_TYPE_FIELD", "type"),
            id_field: text("SEARCH_ID_FIELD", "id"),
            status_field: text("SEARCH_STATUS_FIELD", "status"),
            published_value: text("SEARCH_PUBLISHED_VALUE", "published"),
            batch_size: parse(&lookup, "SEARCH_BATCH_SIZE", 100)?,
            refresh_interval: text("SEARCH_REFRESH_INTERVAL", "5m"),
            max_files: parse(&lookup, "MIGRATION_MAX_FILES", 100)?,
            max_retries: parse(&lookup, "SEARCH_MAX_RETRIES", retry_defaults.max_retries)?,
            retry_initial_ms: parse(
                &lookup,
                "SEARCH_RETRY_INITIAL_MS",
                retry_defaults.initial_retry_delay_ms,
            )?,
            retry_max_ms: parse(&lookup, "SEARCH_RETRY_MAX_MS", retry_defaults.max_retry_delay_ms)?,
            local_storage_root: PathBuf::from(text("LOCAL_STORAGE_ROOT", ".")),
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SyncError> {
        if self.batch_size == 0 {
            return Err(SyncError::config("SEARCH_BATCH_SIZE must be at least 1"));
        }
        if self.max_files == 0 {
            return Err(SyncError::config("MIGRATION_MAX_FILES must be at least 1"));
        }
        if self.retry_initial_ms > self.retry_max_ms {
            return Err(SyncError::config(
                "SEARCH_RETRY_INITIAL_MS must not exceed SEARCH_RETRY_MAX_MS",
            ));
        }
        Ok(())
    }

    pub fn target_config(&self) -> TargetConfig {
        TargetConfig {
            index_prefix: self.index_prefix.clone(),
            type_field: self.type_field.clone(),
            id_field: self.id_field.clone(),
        }
    }

    pub fn publication_filter(&self) -> PublicationFilter {
        PublicationFilter {
            status_field: self.status_field.clone(),
            published_value: self.published_value.clone(),
        }
    }

    pub fn index_config(&self) -> IndexConfig {
        IndexConfig::new(self.index_prefix.clone(), self.refresh_interval.clone())
    }

    pub fn search_index_config(&self) -> SearchIndexConfig {
        SearchIndexConfig::with_max_batch_size(self.batch_size).with_retry(RetryConfig {
            max_retries: self.max_retries,
            initial_retry_delay_ms: self.retry_initial_ms,
            max_retry_delay_ms: self.retry_max_ms,
        })
    }

    pub fn continuation_config(&self) -> ContinuationConfig {
        ContinuationConfig::default().with_max_files(self.max_files)
    }

    /// Names of the indices for the configured record types.
    pub fn index_names(&self) -> Vec<String> {
        let target = self.target_config();
        self.document_types
            .iter()
            .map(|t| target.index_for_type(t))
            .collect()
    }
}

fn parse<F, T>(lookup: &F, name: &str, default: T) -> Result<T, SyncError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).map(|v| v.trim().to_string()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|e| SyncError::config(format!("invalid {} `{}`: {}", name, v, e))),
    }
}
