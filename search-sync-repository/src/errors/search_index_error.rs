//! Search index error types.
//!
//! This module defines the error types that can occur during search index operations.

use thiserror::Error;

use search_sync_shared::ErrorKind;

/// Errors that can occur during search index operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchIndexError {
    /// Validation error (e.g., empty index name or document id).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to reach the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The search engine rejected a document.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// The bulk request as a whole failed.
    #[error("Bulk operation error: {0}")]
    BulkOperationError(String),

    /// Failed to create or configure an index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// The search engine answered with an unexpected HTTP status.
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Failed to parse a response from the search engine.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Create a bulk operation error.
    pub fn bulk_operation(msg: impl Into<String>) -> Self {
        Self::BulkOperationError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an unexpected status error.
    pub fn unexpected_status(status: u16, body: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            status,
            body: body.into(),
        }
    }

    /// Whether the failure is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError(_) => true,
            Self::UnexpectedStatus { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            Self::ValidationError(_)
            | Self::IndexError(_)
            | Self::DeleteError(_)
            | Self::BulkOperationError(_)
            | Self::IndexCreationError(_)
            | Self::ParseError(_) => false,
        }
    }

    /// Classify the error. Only rejections of a single document are local;
    /// everything else aborts the invocation.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) | Self::IndexError(_) => ErrorKind::Indexing,
            _ => ErrorKind::Infrastructure,
        }
    }
}
