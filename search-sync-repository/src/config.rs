//! Configuration types for the SearchIndexClient.

/// Default number of documents per bulk request.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Retry policy for transient search engine failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Initial retry delay in milliseconds.
    pub initial_retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds.
    pub max_retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Configuration for the SearchIndexClient.
#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    /// Maximum number of documents sent in a single bulk request. Larger
    /// inputs are split into consecutive batches.
    pub max_batch_size: usize,
    /// Retry policy for transient failures.
    pub retry: RetryConfig,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryConfig::default(),
        }
    }
}

impl SearchIndexConfig {
    /// Create a config with a custom batch size. A size of zero falls back to
    /// the default.
    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: if max_batch_size == 0 {
                DEFAULT_BATCH_SIZE
            } else {
                max_batch_size
            },
            ..Self::default()
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}
