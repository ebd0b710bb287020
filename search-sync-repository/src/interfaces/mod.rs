//! Interface definitions for the search engine provider.
//!
//! The `SearchIndexProvider` trait allows dependency injection and swappable
//! search backends.

mod search_index_provider;

pub use search_index_provider::SearchIndexProvider;
