//! Document processor implementation.
//!
//! Resolves the index and identifier of canonical documents and wraps them
//! into envelopes for the loader.

use tracing::{debug, instrument};

use crate::errors::PipelineError;
use crate::processor::identifier_text;
use search_sync_shared::{CanonicalDocument, DocumentEnvelope, IndexTarget};

/// Fields and naming used to resolve a document's index target.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    /// Prefix of every index name.
    pub index_prefix: String,
    /// Document field holding the record type.
    pub type_field: String,
    /// Document field holding the identifier.
    pub id_field: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            index_prefix: "search-".to_string(),
            type_field: "type".to_string(),
            id_field: "id".to_string(),
        }
    }
}

impl TargetConfig {
    /// Index name for a record type: the prefix followed by the lower-cased
    /// type, with characters outside `[a-z0-9_-]` replaced by `_`.
    pub fn index_for_type(&self, record_type: &str) -> String {
        let suffix: String = record_type
            .trim()
            .chars()
            .map(|c| c.to_ascii_lowercase())
            .map(|c| match c {
                'a'..='z' | '0'..='9' | '_' | '-' => c,
                _ => '_',
            })
            .collect();
        format!("{}{}", self.index_prefix, suffix)
    }
}

/// Processor that turns canonical documents into envelopes.
pub struct DocumentProcessor {
    config: TargetConfig,
}

/// Result of processing a batch of documents.
#[derive(Debug, Default)]
pub struct ProcessedBatch {
    /// Envelopes ready for loading, in input order.
    pub envelopes: Vec<DocumentEnvelope>,
    /// Documents without a usable target, with their source and cause.
    pub unresolved: Vec<(String, PipelineError)>,
}

impl DocumentProcessor {
    /// Create a new document processor.
    pub fn new(config: TargetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// Resolve where `document` is indexed.
    ///
    /// # Returns
    ///
    /// * `Ok(IndexTarget)` - Index from the type field, identifier from the id field
    /// * `Err(PipelineError::UnresolvedTarget)` - If either field is missing,
    ///   empty or not a scalar
    pub fn resolve_target(&self, document: &CanonicalDocument) -> Result<IndexTarget, PipelineError> {
        let record_type = document
            .get(&self.config.type_field)
            .and_then(|t| t.as_str())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::unresolved(format!(
                    "field `{}` must be a non-empty string",
                    self.config.type_field
                ))
            })?;

        let document_id = document
            .get(&self.config.id_field)
            .and_then(identifier_text)
            .ok_or_else(|| {
                PipelineError::unresolved(format!(
                    "field `{}` must be a non-empty string or a number",
                    self.config.id_field
                ))
            })?;

        Ok(IndexTarget::new(
            self.config.index_for_type(record_type),
            document_id,
        ))
    }

    /// Wrap a document into an envelope addressed to its target.
    pub fn process(&self, document: CanonicalDocument) -> Result<DocumentEnvelope, PipelineError> {
        let target = self.resolve_target(&document)?;
        Ok(DocumentEnvelope::new(target, document))
    }

    /// Process a batch of `(source, document)` pairs.
    ///
    /// Unresolvable documents are collected with their source; they never
    /// stop the batch.
    #[instrument(skip(self, documents), fields(document_count = documents.len()))]
    pub fn process_batch(&self, documents: Vec<(String, CanonicalDocument)>) -> ProcessedBatch {
        let mut batch = ProcessedBatch {
            envelopes: Vec::with_capacity(documents.len()),
            unresolved: Vec::new(),
        };

        for (source, document) in documents {
            match self.process(document) {
                Ok(envelope) => batch.envelopes.push(envelope),
                Err(e) => {
                    debug!(source = %source, error = %e, "Skipping document without target");
                    batch.unresolved.push((source, e));
                }
            }
        }

        debug!(
            processed_count = batch.envelopes.len(),
            unresolved_count = batch.unresolved.len(),
            "Processed document batch"
        );
        batch
    }
}

impl Default for DocumentProcessor {
    fn default() -> Self {
        Self::new(TargetConfig::default())
    }
}
