//! OpenSearch index configuration.
//!
//! Documents are schemaless, so indices rely on dynamic mappings and only the
//! settings are managed here.

use serde_json::{json, Value};

/// Settings shared by every index the synchronizer writes to.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Prefix of every managed index name.
    pub index_prefix: String,
    /// Refresh interval applied by `prepare_index` (e.g. "5m").
    pub refresh_interval: String,
    /// Primary shards for newly created indices.
    pub number_of_shards: u32,
    /// Replicas for newly created indices.
    pub number_of_replicas: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_prefix: "search-".to_string(),
            refresh_interval: "5m".to_string(),
            number_of_shards: 1,
            number_of_replicas: 1,
        }
    }
}

impl IndexConfig {
    /// Create a config for the given prefix and refresh interval.
    pub fn new(index_prefix: impl Into<String>, refresh_interval: impl Into<String>) -> Self {
        Self {
            index_prefix: index_prefix.into(),
            refresh_interval: refresh_interval.into(),
            ..Self::default()
        }
    }

    /// Wildcard pattern matching every managed index.
    pub fn index_pattern(&self) -> String {
        format!("{}*", self.index_prefix)
    }

    /// Body of the create index request.
    pub fn create_body(&self) -> Value {
        json!({
            "settings": {
                "number_of_shards": self.number_of_shards,
                "number_of_replicas": self.number_of_replicas,
                "refresh_interval": self.refresh_interval
            }
        })
    }

    /// Body of the update settings request for an existing index.
    pub fn refresh_settings_body(&self) -> Value {
        json!({
            "index": {
                "refresh_interval": self.refresh_interval
            }
        })
    }
}
