//! Extraction of canonical documents from export files.
//!
//! An export is a set of line-delimited files under a storage prefix, either
//! DynamoDB JSON or Ion text, optionally gzip-compressed. Every line holds one
//! record wrapped in a root `Item` key. Extraction decodes each record and
//! keeps only currently-published documents.

mod format;

pub use format::{Encoding, ExportFormat};

use std::io::Read;
use std::sync::Arc;

use flate2::read::GzDecoder;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::errors::PipelineError;
use crate::processor::PublicationFilter;
use crate::storage::{ObjectMeta, StorageBackend};
use search_sync_shared::{CanonicalDocument, IndexingFailure, SourceLocation};
use search_sync_wire::{decode_item, ion, DecodeError};

/// Root key every exported record is wrapped in.
pub const ITEM_ROOT: &str = "Item";

/// Marker contained in the keys of export manifest files.
const MANIFEST_MARKER: &str = "manifest";

/// Counts for one export file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    /// Non-blank lines read.
    pub records: usize,
    /// Records kept as published documents.
    pub published: usize,
    /// Records dropped because they are not published.
    pub filtered: usize,
    /// Records that could not be read or decoded.
    pub failed: usize,
}

impl FileStats {
    /// Add another file's counts to these.
    pub fn absorb(&mut self, other: &FileStats) {
        self.records += other.records;
        self.published += other.published;
        self.filtered += other.filtered;
        self.failed += other.failed;
    }
}

/// What was read from one export file.
#[derive(Debug, Clone, Default)]
pub struct FileExtract {
    /// Key of the file.
    pub key: String,
    /// Published documents, in file order, each with its source line.
    pub documents: Vec<ExtractedDocument>,
    /// Records that failed to decode.
    pub failures: Vec<IndexingFailure>,
    pub stats: FileStats,
}

/// A published document and where it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    /// `<key>:<line>` of the record.
    pub source: String,
    pub document: CanonicalDocument,
}

/// Reads export files from storage and turns them into canonical documents.
pub struct ExtractionPipeline {
    storage: Arc<dyn StorageBackend>,
    filter: PublicationFilter,
}

impl ExtractionPipeline {
    /// Create a new extraction pipeline.
    pub fn new(storage: Arc<dyn StorageBackend>, filter: PublicationFilter) -> Self {
        Self { storage, filter }
    }

    /// Whether a listed object is an export data file.
    ///
    /// Zero-length objects, manifests and control markers such as `_started`
    /// are skipped. Only the file name is inspected, never the prefix.
    pub fn is_data_file(meta: &ObjectMeta) -> bool {
        if meta.size == 0 || meta.key.ends_with('/') {
            return false;
        }
        let name = meta.key.rsplit('/').next().unwrap_or(&meta.key);
        !name.contains(MANIFEST_MARKER) && !name.starts_with('_')
    }

    /// List the data files under `location`, sorted by key, starting at
    /// `marker` when one is given.
    ///
    /// # Arguments
    ///
    /// * `location` - Bucket and prefix of the export
    /// * `marker` - Key of the first file to return; earlier keys are skipped
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ObjectMeta>)` - Data files in lexicographic key order
    /// * `Err(PipelineError)` - If listing fails
    #[instrument(skip(self), fields(location = %location))]
    pub async fn list_files(
        &self,
        location: &SourceLocation,
        marker: Option<&str>,
    ) -> Result<Vec<ObjectMeta>, PipelineError> {
        let listed = self.storage.list(&location.bucket, &location.prefix).await?;
        let total = listed.len();

        let mut files: Vec<ObjectMeta> = listed
            .into_iter()
            .filter(Self::is_data_file)
            .filter(|meta| marker.map_or(true, |m| meta.key.as_str() >= m))
            .collect();
        files.sort_by(|a, b| a.key.cmp(&b.key));

        debug!(listed = total, data_files = files.len(), "Listed export files");
        Ok(files)
    }

    /// Read and decode one export file.
    ///
    /// Per-record problems are collected as failures; only a storage
    /// failure is returned as an error.
    #[instrument(skip(self, meta), fields(key = %meta.key))]
    pub async fn read_file(
        &self,
        bucket: &str,
        meta: &ObjectMeta,
    ) -> Result<FileExtract, PipelineError> {
        let raw = self.storage.get(bucket, &meta.key).await?;
        let mut extract = FileExtract {
            key: meta.key.clone(),
            ..FileExtract::default()
        };

        let format = ExportFormat::from_key(&meta.key);
        let content = if format.compressed {
            let mut decompressed = Vec::new();
            match GzDecoder::new(&raw[..]).read_to_end(&mut decompressed) {
                Ok(_) => decompressed,
                Err(e) => {
                    warn!(error = %e, "Failed to decompress export file");
                    extract.stats.failed += 1;
                    extract.failures.push(IndexingFailure::for_record(
                        meta.key.clone(),
                        format!("gzip: {}", e),
                    ));
                    return Ok(extract);
                }
            }
        } else {
            raw.to_vec()
        };

        for (index, line) in content.split(|b| *b == b'\n').enumerate() {
            let source = format!("{}:{}", meta.key, index + 1);
            let line = match std::str::from_utf8(line) {
                Ok(line) => line.trim(),
                Err(e) => {
                    extract.stats.records += 1;
                    extract.stats.failed += 1;
                    extract
                        .failures
                        .push(IndexingFailure::for_record(source, format!("invalid UTF-8: {}", e)));
                    continue;
                }
            };
            if line.is_empty() || line == ion::VERSION_MARKER {
                continue;
            }
            extract.stats.records += 1;

            match self.decode_line(format.encoding, line) {
                Ok(document) if self.filter.is_published(&document) => {
                    extract.stats.published += 1;
                    extract.documents.push(ExtractedDocument { source, document });
                }
                Ok(_) => extract.stats.filtered += 1,
                Err(e) => {
                    debug!(source = %source, error = %e, "Skipping undecodable record");
                    extract.stats.failed += 1;
                    extract
                        .failures
                        .push(IndexingFailure::for_record(source, e.to_string()));
                }
            }
        }

        info!(
            records = extract.stats.records,
            published = extract.stats.published,
            filtered = extract.stats.filtered,
            failed = extract.stats.failed,
            "Read export file"
        );
        Ok(extract)
    }

    /// Decode one record line into a canonical document.
    pub fn decode_line(
        &self,
        encoding: Option<Encoding>,
        line: &str,
    ) -> Result<CanonicalDocument, DecodeError> {
        let encoding = encoding.unwrap_or_else(|| Encoding::sniff(line));
        let record = match encoding {
            Encoding::DynamoJson => match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(record)) => record,
                Ok(_) => return Err(DecodeError::InvalidJson("record is not an object".to_string())),
                Err(e) => return Err(DecodeError::InvalidJson(e.to_string())),
            },
            Encoding::IonText => ion::to_wire_record(line)?,
        };

        decode_item(&Self::take_root(record)?)
    }

    fn take_root(mut record: Map<String, Value>) -> Result<Map<String, Value>, DecodeError> {
        match record.remove(ITEM_ROOT) {
            Some(Value::Object(item)) => Ok(item),
            Some(_) => Err(DecodeError::invalid_payload(ITEM_ROOT, "expected an attribute map")),
            None => Err(DecodeError::MissingRoot(ITEM_ROOT.to_string())),
        }
    }

    /// Lazily extract every published document under `location`.
    ///
    /// Files are listed once, then read one at a time as the stream is
    /// polled. Undecodable records are logged and skipped.
    pub fn extract<'a>(
        &'a self,
        location: &'a SourceLocation,
    ) -> BoxStream<'a, Result<ExtractedDocument, PipelineError>> {
        stream::once(self.list_files(location, None))
            .map_ok(move |files| {
                stream::iter(files)
                    .then(move |meta| async move { self.read_file(&location.bucket, &meta).await })
                    .map_ok(|extract| {
                        for failure in &extract.failures {
                            warn!(failure = %failure, "Record skipped");
                        }
                        stream::iter(extract.documents.into_iter().map(Ok))
                    })
                    .try_flatten()
            })
            .try_flatten()
            .boxed()
    }
}
