//! `object_store` backed storage for `s3://` and `file://` locations.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::debug;

use super::{ObjectMeta, StorageBackend, StorageError};

#[derive(Debug, Clone)]
enum StoreKind {
    /// AWS S3, credentials and region from the environment.
    S3,
    /// Local directory; each bucket is a subdirectory of the root.
    Local(PathBuf),
}

/// Storage backend over the `object_store` crate.
///
/// One store is built per bucket on first use and cached.
pub struct ObjectStoreBackend {
    kind: StoreKind,
    stores: RwLock<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl ObjectStoreBackend {
    /// Backend for `s3://` locations.
    pub fn s3() -> Self {
        Self::with_kind(StoreKind::S3)
    }

    /// Backend for `file://` locations rooted at `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self::with_kind(StoreKind::Local(root.into()))
    }

    /// Backend for a location scheme (`s3` or `file`).
    pub fn for_scheme(scheme: &str, local_root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        match scheme {
            "s3" => Ok(Self::s3()),
            "file" => Ok(Self::local(local_root)),
            other => Err(StorageError::UnsupportedScheme(other.to_string())),
        }
    }

    fn with_kind(kind: StoreKind) -> Self {
        Self {
            kind,
            stores: RwLock::new(HashMap::new()),
        }
    }

    fn store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
        if let Some(store) = self
            .stores
            .read()
            .map_err(|_| StorageError::backend("lock poisoned"))?
            .get(bucket)
        {
            return Ok(store.clone());
        }

        let store: Arc<dyn ObjectStore> = match &self.kind {
            StoreKind::S3 => Arc::new(
                AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .build()
                    .map_err(map_error)?,
            ),
            StoreKind::Local(root) => Arc::new(
                LocalFileSystem::new_with_prefix(root.join(bucket)).map_err(map_error)?,
            ),
        };
        debug!(bucket, kind = ?self.kind, "Opened object store");

        self.stores
            .write()
            .map_err(|_| StorageError::backend("lock poisoned"))?
            .insert(bucket.to_string(), store.clone());
        Ok(store)
    }
}

fn map_error(error: object_store::Error) -> StorageError {
    match error {
        object_store::Error::NotFound { path, .. } => StorageError::NotFound(path),
        other => StorageError::backend(other.to_string()),
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        let store = self.store(bucket)?;

        // Object store prefixes match whole path segments, so list the
        // enclosing directory and filter on the raw prefix.
        let directory = prefix.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let directory = (!directory.is_empty()).then(|| Path::from(directory));

        let listed: Vec<object_store::ObjectMeta> = store
            .list(directory.as_ref())
            .try_collect()
            .await
            .map_err(map_error)?;

        Ok(listed
            .into_iter()
            .filter(|meta| meta.location.as_ref().starts_with(prefix))
            .map(|meta| ObjectMeta {
                key: meta.location.to_string(),
                size: meta.size as u64,
                last_modified: Some(meta.last_modified),
            })
            .collect())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let store = self.store(bucket)?;

        store
            .get(&Path::from(key))
            .await
            .map_err(map_error)?
            .bytes()
            .await
            .map_err(map_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_for_scheme() {
        assert!(ObjectStoreBackend::for_scheme("s3", ".").is_ok());
        assert!(ObjectStoreBackend::for_scheme("file", ".").is_ok());
        assert_eq!(
            ObjectStoreBackend::for_scheme("gs", ".").err(),
            Some(StorageError::UnsupportedScheme("gs".to_string()))
        );
    }

    #[tokio::test]
    async fn test_local_list_and_get() {
        let root = tempfile::tempdir().unwrap();
        let data = root.path().join("exports").join("run-1").join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("a.json"), "{\"Item\":{}}\n").unwrap();
        fs::write(data.join("b.json"), "").unwrap();
        fs::create_dir_all(root.path().join("exports").join("run-2")).unwrap();
        fs::write(root.path().join("exports").join("run-2").join("c.json"), "{}").unwrap();

        let backend = ObjectStoreBackend::local(root.path());

        let mut listed = backend.list("exports", "run-1/").await.unwrap();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        let keys: Vec<&str> = listed.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["run-1/data/a.json", "run-1/data/b.json"]);
        assert_eq!(listed[1].size, 0);

        let content = backend.get("exports", "run-1/data/a.json").await.unwrap();
        assert_eq!(content, Bytes::from("{\"Item\":{}}\n"));
    }

    #[tokio::test]
    async fn test_local_get_missing() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("exports")).unwrap();

        let backend = ObjectStoreBackend::local(root.path());

        assert!(matches!(
            backend.get("exports", "missing.json").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
