//! Error types for the search sync pipeline.

use thiserror::Error;

use crate::storage::StorageError;
use search_sync_repository::SearchIndexError;
use search_sync_shared::{ErrorKind, InputError};
use search_sync_wire::DecodeError;

/// Errors that can occur while running the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Object storage could not be listed or read.
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// The search engine failed.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchIndexError),

    /// A trigger payload or notification is malformed.
    #[error("Input error: {0}")]
    InputError(#[from] InputError),

    /// A wire-format record could not be decoded.
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// A document has no usable type or identifier.
    #[error("Unresolved target: {0}")]
    UnresolvedTarget(String),

    /// The continuation could not be emitted.
    #[error("Emit error: {0}")]
    EmitError(String),

    /// Invalid pipeline configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PipelineError {
    /// Create an unresolved target error.
    pub fn unresolved(msg: impl Into<String>) -> Self {
        Self::UnresolvedTarget(msg.into())
    }

    /// Create an emit error.
    pub fn emit(msg: impl Into<String>) -> Self {
        Self::EmitError(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Classify the error.
    ///
    /// Decode and indexing errors are local to one record; infrastructure and
    /// input errors abort the invocation.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StorageError(_) | Self::EmitError(_) => ErrorKind::Infrastructure,
            Self::SearchError(e) => e.kind(),
            Self::InputError(e) => e.kind(),
            Self::DecodeError(_) => ErrorKind::Decode,
            Self::UnresolvedTarget(_) => ErrorKind::Indexing,
            Self::ConfigError(_) => ErrorKind::Input,
        }
    }

    /// Whether the error aborts the current invocation.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Infrastructure | ErrorKind::Input)
    }
}
