//! Storage backend abstraction for export files (S3, local, memory).
//!
//! Exports are addressed as `<scheme>://<bucket>/<prefix>`. A backend serves
//! one scheme; the bucket is passed on every call.

mod memory;
mod object_store_backend;

pub use memory::MemoryBackend;
pub use object_store_backend::ObjectStoreBackend;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// No backend serves this scheme.
    #[error("unsupported storage scheme: {0}")]
    UnsupportedScheme(String),

    /// The backend failed (network, permissions, I/O).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Create a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Metadata about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object key within the bucket.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Storage backend trait for export files.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Lists objects in `bucket` whose key starts with `prefix`.
    ///
    /// **Ordering**: results come back in arbitrary order. Callers requiring
    /// deterministic order sort by `key`.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectMeta>, StorageError>;

    /// Reads an entire object.
    ///
    /// Returns `StorageError::NotFound` if the object doesn't exist.
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError>;
}
