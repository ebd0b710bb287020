//! Canonical documents and the envelope passed from extraction to indexing.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decoded record: plain JSON with wire-format tags stripped.
pub type CanonicalDocument = Value;

/// Where a document lives in the search engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexTarget {
    /// Index name.
    pub index: String,
    /// Document identifier within the index.
    pub document_id: String,
}

impl IndexTarget {
    /// Create a new index target.
    pub fn new(index: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            document_id: document_id.into(),
        }
    }
}

impl fmt::Display for IndexTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.document_id)
    }
}

/// Indexing metadata carried next to a document body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionAttributes {
    pub index: String,
    pub document_identifier: String,
}

/// A document ready for indexing.
///
/// Wire shape: `{ "consumptionAttributes": { "index", "documentIdentifier" }, "body": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEnvelope {
    pub consumption_attributes: ConsumptionAttributes,
    pub body: CanonicalDocument,
}

impl DocumentEnvelope {
    /// Wrap a document body for the given target.
    pub fn new(target: IndexTarget, body: CanonicalDocument) -> Self {
        Self {
            consumption_attributes: ConsumptionAttributes {
                index: target.index,
                document_identifier: target.document_id,
            },
            body,
        }
    }

    /// The target this envelope is written to.
    pub fn target(&self) -> IndexTarget {
        IndexTarget::new(
            self.consumption_attributes.index.clone(),
            self.consumption_attributes.document_identifier.clone(),
        )
    }

    pub fn index(&self) -> &str {
        &self.consumption_attributes.index
    }

    pub fn document_id(&self) -> &str {
        &self.consumption_attributes.document_identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = DocumentEnvelope::new(
            IndexTarget::new("search-work", "abc"),
            json!({"id": "abc", "title": "Ledger"}),
        );

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "consumptionAttributes": {"index": "search-work", "documentIdentifier": "abc"},
                "body": {"id": "abc", "title": "Ledger"}
            })
        );
    }

    #[test]
    fn test_envelope_target() {
        let envelope = DocumentEnvelope::new(IndexTarget::new("search-work", "abc"), json!({}));
        assert_eq!(envelope.target(), IndexTarget::new("search-work", "abc"));
        assert_eq!(envelope.target().to_string(), "search-work/abc");
    }
}
