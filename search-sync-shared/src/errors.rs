//! Input errors and the error taxonomy shared by every crate.

use thiserror::Error;

/// Coarse classification of a failure.
///
/// Every crate-level error maps onto one of these so callers can decide
/// whether a failure is local to one record or aborts the invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A single record could not be decoded. The record is skipped.
    Decode,
    /// The search engine rejected a single document.
    Indexing,
    /// Storage or search engine unreachable. Aborts the invocation.
    Infrastructure,
    /// Malformed trigger payload or notification. Not retried.
    Input,
}

/// Errors raised while reading trigger payloads and notifications.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    /// The payload is not valid JSON or misses a required field.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The source location is not of the form `<scheme>://<bucket>/<prefix>`.
    #[error("Invalid source location: {0}")]
    InvalidLocation(String),

    /// The stream notification has no event type.
    #[error("Missing event type")]
    MissingEventType,

    /// The stream notification carries an event type this system does not know.
    #[error("Unrecognized event type: {0}")]
    UnrecognizedEventType(String),

    /// A field required by the notification's event type is absent.
    #[error("Missing field: {0}")]
    MissingField(String),
}

impl InputError {
    /// Create a malformed payload error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    /// Create a missing field error.
    pub fn missing_field(name: impl Into<String>) -> Self {
        Self::MissingField(name.into())
    }

    /// Input errors are always classified as [`ErrorKind::Input`].
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Input
    }
}
