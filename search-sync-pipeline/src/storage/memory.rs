//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{ObjectMeta, StorageBackend, StorageError};

/// In-memory storage backend for tests and local runs.
///
/// Thread-safe via `RwLock`. Cloning shares the underlying objects.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    objects: Arc<RwLock<HashMap<(String, String), StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object, replacing any previous content.
    pub fn put(
        &self,
        bucket: &str,
        key: &str,
        data: impl Into<Bytes>,
    ) -> Result<(), StorageError> {
        self.objects
            .write()
            .map_err(|_| StorageError::backend("lock poisoned"))?
            .insert(
                (bucket.to_string(), key.to_string()),
                StoredObject {
                    data: data.into(),
                    last_modified: Utc::now(),
                },
            );
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| StorageError::backend("lock poisoned"))?;

        Ok(objects
            .iter()
            .filter(|((b, key), _)| b == bucket && key.starts_with(prefix))
            .map(|((_, key), object)| ObjectMeta {
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified: Some(object.last_modified),
            })
            .collect())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| StorageError::backend("lock poisoned"))?;

        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| object.data.clone())
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_filters_bucket_and_prefix() {
        let backend = MemoryBackend::new();
        backend.put("exports", "run-1/data/a.json", "{}").unwrap();
        backend.put("exports", "run-1/data/b.json", "{}").unwrap();
        backend.put("exports", "run-2/data/c.json", "{}").unwrap();
        backend.put("other", "run-1/data/d.json", "{}").unwrap();

        let mut keys: Vec<String> = backend
            .list("exports", "run-1/")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.key)
            .collect();
        keys.sort();

        assert_eq!(keys, vec!["run-1/data/a.json", "run-1/data/b.json"]);
    }

    #[tokio::test]
    async fn test_get_and_not_found() {
        let backend = MemoryBackend::new();
        backend.put("exports", "a.json", "line").unwrap();

        assert_eq!(backend.get("exports", "a.json").await.unwrap(), Bytes::from("line"));
        assert_eq!(
            backend.get("exports", "missing.json").await,
            Err(StorageError::NotFound("exports/missing.json".to_string()))
        );
    }

    #[tokio::test]
    async fn test_list_reports_size() {
        let backend = MemoryBackend::new();
        backend.put("exports", "empty", Bytes::new()).unwrap();

        let listed = backend.list("exports", "").await.unwrap();
        assert_eq!(listed[0].size, 0);
    }
}
