//! Migration trigger payloads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::InputError;

/// Location of a bulk export: `<scheme>://<bucket>/<prefix>`.
///
/// The prefix may be empty, in which case the whole bucket is walked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceLocation {
    /// Storage scheme, e.g. `s3` or `file`.
    pub scheme: String,
    /// Bucket (or top-level directory for local storage).
    pub bucket: String,
    /// Key prefix inside the bucket, without a leading slash.
    pub prefix: String,
}

impl SourceLocation {
    /// Create a location from its parts.
    pub fn new(
        scheme: impl Into<String>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }
}

impl FromStr for SourceLocation {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| InputError::InvalidLocation(s.to_string()))?;

        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(InputError::InvalidLocation(s.to_string()));
        }

        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix),
            None => (rest, ""),
        };

        if bucket.is_empty() {
            return Err(InputError::InvalidLocation(s.to_string()));
        }

        Ok(Self::new(scheme.to_ascii_lowercase(), bucket, prefix))
    }
}

impl TryFrom<String> for SourceLocation {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceLocation> for String {
    fn from(location: SourceLocation) -> Self {
        location.to_string()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.prefix)
    }
}

/// A request to migrate one export location into the search index.
///
/// Serialized as the trigger payload
/// `{ "s3Location": "...", "startIndex": "..." }`; the continuation emitted at
/// the end of a truncated run has the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportJob {
    /// Where the export lives.
    #[serde(rename = "s3Location")]
    pub location: SourceLocation,
    /// Key of the first file to process; `None` starts from the beginning.
    #[serde(
        rename = "startIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub marker: Option<String>,
}

impl ImportJob {
    /// Create a job starting at the beginning of the location.
    pub fn new(location: SourceLocation) -> Self {
        Self {
            location,
            marker: None,
        }
    }

    /// Resume at the given marker.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    /// Parse a trigger payload. An empty `startIndex` is treated as absent.
    pub fn from_payload(payload: &str) -> Result<Self, InputError> {
        let mut job: ImportJob =
            serde_json::from_str(payload).map_err(|e| InputError::malformed(e.to_string()))?;
        job.marker = job.marker.filter(|m| !m.is_empty());
        Ok(job)
    }

    /// Render the job as a trigger payload.
    pub fn to_payload(&self) -> String {
        serde_json::json!(self).to_string()
    }

    /// The continuation of this job at a new marker.
    pub fn continue_at(&self, marker: impl Into<String>) -> Self {
        Self {
            location: self.location.clone(),
            marker: Some(marker.into()),
        }
    }
}
