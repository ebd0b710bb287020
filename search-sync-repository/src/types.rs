//! Result types for search index operations.

use crate::errors::SearchIndexError;

/// Result of a batch operation for a single document.
///
/// Represents the outcome of one document within a bulk request. It indicates
/// whether the engine accepted the document and includes the rejection if not.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperationResult {
    /// Index the document was addressed to.
    pub index: String,
    /// Identifier of the document.
    pub document_id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error if the operation failed.
    pub error: Option<SearchIndexError>,
}

impl BatchOperationResult {
    /// A successful result for the given document.
    pub fn succeeded(index: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            document_id: document_id.into(),
            success: true,
            error: None,
        }
    }

    /// A failed result for the given document.
    pub fn failed(
        index: impl Into<String>,
        document_id: impl Into<String>,
        error: SearchIndexError,
    ) -> Self {
        Self {
            index: index.into(),
            document_id: document_id.into(),
            success: false,
            error: Some(error),
        }
    }
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// Results are in the same order as the documents that were submitted, so a
/// caller can match every rejection back to its input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOperationSummary {
    /// Total number of documents in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each document.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Build a summary from per-document results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// The failed results of this batch.
    pub fn failures(&self) -> impl Iterator<Item = &BatchOperationResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Outcome of a bulk upsert across all batches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkUpsertReport {
    /// One summary per engine call, in submission order.
    pub batches: Vec<BatchOperationSummary>,
    /// Documents rejected before submission because their target was incomplete.
    pub rejected: Vec<BatchOperationResult>,
}

impl BulkUpsertReport {
    /// Number of documents the engine accepted.
    pub fn succeeded(&self) -> usize {
        self.batches.iter().map(|b| b.succeeded).sum()
    }

    /// Every failed document, pre-submission rejections first.
    pub fn failures(&self) -> impl Iterator<Item = &BatchOperationResult> {
        self.rejected
            .iter()
            .chain(self.batches.iter().flat_map(|b| b.failures()))
    }
}

/// Outcome of deleting a document by identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// This many documents carried the identifier and were removed.
    Deleted(u64),
    /// No index held a document with the identifier.
    NotFound,
}

/// What preparing an index did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPreparation {
    /// The index did not exist and was created.
    Created,
    /// The index existed; its refresh interval was updated.
    Updated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_results() {
        let summary = BatchOperationSummary::from_results(vec![
            BatchOperationResult::succeeded("search-work", "1"),
            BatchOperationResult::failed("search-work", "2", SearchIndexError::index("bad")),
            BatchOperationResult::succeeded("search-work", "3"),
        ]);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        let failed: Vec<&str> = summary.failures().map(|r| r.document_id.as_str()).collect();
        assert_eq!(failed, vec!["2"]);
    }

    #[test]
    fn test_report_failures_order() {
        let report = BulkUpsertReport {
            batches: vec![BatchOperationSummary::from_results(vec![
                BatchOperationResult::failed("search-work", "b", SearchIndexError::index("x")),
            ])],
            rejected: vec![BatchOperationResult::failed(
                "",
                "a",
                SearchIndexError::validation("empty index"),
            )],
        };

        let ids: Vec<&str> = report.failures().map(|r| r.document_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(report.succeeded(), 0);
    }
}
