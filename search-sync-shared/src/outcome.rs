//! Per-invocation results of the migration path.

use std::fmt;

use serde::Serialize;

/// A record or document that could not be indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexingFailure {
    /// Document identifier, when it could be resolved.
    pub document_id: Option<String>,
    /// Where the record came from, e.g. `data/0001.json.gz:17`.
    pub source: Option<String>,
    /// Human-readable cause.
    pub cause: String,
}

impl IndexingFailure {
    /// A failure for a document whose identifier is known.
    pub fn for_document(document_id: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            source: None,
            cause: cause.into(),
        }
    }

    /// A failure for a record that never became a document.
    pub fn for_record(source: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            document_id: None,
            source: Some(source.into()),
            cause: cause.into(),
        }
    }

    /// Attach the source location of the record.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for IndexingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.document_id, &self.source) {
            (Some(id), Some(source)) => write!(f, "{} ({}): {}", id, source, self.cause),
            (Some(id), None) => write!(f, "{}: {}", id, self.cause),
            (None, Some(source)) => write!(f, "{}: {}", source, self.cause),
            (None, None) => write!(f, "{}", self.cause),
        }
    }
}

/// What one bounded migration invocation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexingOutcome {
    /// Every record or document that failed, in processing order.
    pub failures: Vec<IndexingFailure>,
    /// Key of the next unprocessed file when the run was truncated.
    pub next_marker: Option<String>,
    /// Whether files remain after this invocation.
    pub truncated: bool,
    /// Files processed by this invocation.
    pub files_processed: usize,
    /// Documents accepted by the search engine.
    pub documents_indexed: usize,
}

impl IndexingOutcome {
    /// Failure descriptions as returned to the invoking runtime.
    pub fn failure_messages(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        let failure = IndexingFailure::for_document("abc", "mapper_parsing_exception: bad date");
        assert_eq!(failure.to_string(), "abc: mapper_parsing_exception: bad date");

        let failure = IndexingFailure::for_record("data/0001.json:3", "no populated tag");
        assert_eq!(failure.to_string(), "data/0001.json:3: no populated tag");

        let failure = IndexingFailure::for_document("abc", "missing type").with_source("f:1");
        assert_eq!(failure.to_string(), "abc (f:1): missing type");
    }

    #[test]
    fn test_failure_messages() {
        let outcome = IndexingOutcome {
            failures: vec![
                IndexingFailure::for_document("a", "x"),
                IndexingFailure::for_document("b", "y"),
            ],
            ..Default::default()
        };

        assert_eq!(outcome.failure_messages(), vec!["a: x", "b: y"]);
        assert!(!outcome.is_success());
        assert!(IndexingOutcome::default().is_success());
    }
}
