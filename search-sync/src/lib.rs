//! # Search Sync
//!
//! Main library for the search index synchronizer.
//!
//! This crate provides the configuration, dependency wiring and logging
//! setup used by the `search-sync` binary.

pub mod config;
pub mod telemetry;

pub use config::{Dependencies, Settings};

use thiserror::Error;

/// Errors that can occur during synchronizer initialization or execution.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] search_sync_pipeline::PipelineError),

    /// Search error.
    #[error("Search error: {0}")]
    SearchError(#[from] search_sync_repository::SearchIndexError),

    /// Storage error.
    #[error("Storage error: {0}")]
    StorageError(#[from] search_sync_pipeline::StorageError),

    /// Malformed trigger payload.
    #[error("Input error: {0}")]
    InputError(#[from] search_sync_shared::InputError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SyncError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
