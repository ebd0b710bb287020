//! Decode error types.

use thiserror::Error;

/// Errors raised while reading a wire-format record.
///
/// A decode error is fatal to the record it occurred in and to nothing else.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The tagged value has no populated tag.
    #[error("no populated tag")]
    NoPopulatedTag,

    /// `{"NULL": false}` with nothing else populated.
    #[error("false-null not supported")]
    FalseNull,

    /// More than one tag is populated.
    #[error("multiple populated tags: {}", .0.join(", "))]
    MultiplePopulatedTags(Vec<String>),

    /// The tag is not part of the wire format.
    #[error("unknown tag: {0}")]
    UnknownTag(String),

    /// The value is not a tagged object.
    #[error("expected a tagged value, found {0}")]
    NotTagged(String),

    /// The payload under a tag has the wrong JSON type.
    #[error("invalid {tag} payload: {reason}")]
    InvalidPayload { tag: String, reason: String },

    /// An `N`/`NS` payload that is not a decimal literal.
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// A `B`/`BS` payload that is not base64.
    #[error("invalid binary: {0}")]
    InvalidBinary(String),

    /// The line is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The record has no root item container.
    #[error("missing root key {0}")]
    MissingRoot(String),

    /// The Ion text could not be transcoded.
    #[error("invalid Ion text at offset {offset}: {reason}")]
    Transcode { offset: usize, reason: String },

    /// A nested failure, annotated with the field it occurred in.
    #[error("field {field}: {source}")]
    InField {
        field: String,
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Create an invalid payload error.
    pub fn invalid_payload(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    /// Create a transcode error.
    pub fn transcode(offset: usize, reason: impl Into<String>) -> Self {
        Self::Transcode {
            offset,
            reason: reason.into(),
        }
    }

    /// Annotate the error with the field it occurred in.
    pub fn in_field(self, field: impl Into<String>) -> Self {
        Self::InField {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, without field annotations.
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            Self::InField { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
