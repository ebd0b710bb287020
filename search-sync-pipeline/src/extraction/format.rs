//! Export file format detection.

/// Record encoding of an export file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// One DynamoDB JSON object per line.
    DynamoJson,
    /// One Ion text struct per line.
    IonText,
}

impl Encoding {
    /// Guess the encoding of a single line.
    ///
    /// JSON records open with a quoted key; Ion records use bare field
    /// names or start with the version marker.
    pub fn sniff(line: &str) -> Self {
        let rest = line.trim_start();
        match rest.strip_prefix('{') {
            Some(body) if body.trim_start().starts_with('"') || body.trim_start().starts_with('}') => {
                Self::DynamoJson
            }
            _ => Self::IonText,
        }
    }
}

/// Encoding and compression of an export file, derived from its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// `None` when the extension does not say; each line is sniffed.
    pub encoding: Option<Encoding>,
    /// Whether the object is gzip-compressed.
    pub compressed: bool,
}

impl ExportFormat {
    /// Detect the format from an object key such as `data/0001.json.gz`.
    pub fn from_key(key: &str) -> Self {
        let lower = key.to_ascii_lowercase();
        let (stem, compressed) = match lower.strip_suffix(".gz") {
            Some(stem) => (stem, true),
            None => (lower.as_str(), false),
        };

        let encoding = if stem.ends_with(".ion") {
            Some(Encoding::IonText)
        } else if stem.ends_with(".json") || stem.ends_with(".jsonl") {
            Some(Encoding::DynamoJson)
        } else {
            None
        };

        Self {
            encoding,
            compressed,
        }
    }
}
