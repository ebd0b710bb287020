//! Processor module for the search sync pipeline.
//!
//! Turns canonical documents into indexable envelopes and change
//! notifications into index actions.

mod document_processor;
mod stream_processor;

pub use document_processor::{DocumentProcessor, ProcessedBatch, TargetConfig};
pub use stream_processor::{StreamProcessor, SyncAction};

use serde_json::Value;

use search_sync_shared::CanonicalDocument;

/// Decides which documents belong in the index.
#[derive(Debug, Clone)]
pub struct PublicationFilter {
    /// Document field holding the publication status.
    pub status_field: String,
    /// Status value of documents that belong in the index.
    pub published_value: String,
}

impl Default for PublicationFilter {
    fn default() -> Self {
        Self {
            status_field: "status".to_string(),
            published_value: "published".to_string(),
        }
    }
}

impl PublicationFilter {
    /// Whether a decoded status value is the published one, ignoring ASCII case.
    pub fn is_published_status(&self, status: &Value) -> bool {
        status
            .as_str()
            .is_some_and(|status| status.eq_ignore_ascii_case(&self.published_value))
    }

    /// Whether `document` carries the published status.
    pub fn is_published(&self, document: &CanonicalDocument) -> bool {
        document
            .get(&self.status_field)
            .is_some_and(|status| self.is_published_status(status))
    }
}

/// Text form of an identifier value: strings as-is, numbers in their exact
/// decimal form. Anything else, or an empty string, has no identifier.
pub(crate) fn identifier_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_published_ignores_case() {
        let filter = PublicationFilter::default();
        assert!(filter.is_published(&json!({"status": "published"})));
        assert!(filter.is_published(&json!({"status": "PUBLISHED"})));
        assert!(!filter.is_published(&json!({"status": "DRAFT"})));
        assert!(!filter.is_published(&json!({"title": "no status"})));
        assert!(!filter.is_published(&json!({"status": 1})));
    }

    #[test]
    fn test_identifier_text() {
        assert_eq!(identifier_text(&json!("w1")), Some("w1".to_string()));
        assert_eq!(identifier_text(&json!(42)), Some("42".to_string()));
        assert_eq!(identifier_text(&json!("")), None);
        assert_eq!(identifier_text(&json!(null)), None);
        assert_eq!(identifier_text(&json!(["w1"])), None);
        assert_eq!(identifier_text(&json!(true)), None);
    }
}
