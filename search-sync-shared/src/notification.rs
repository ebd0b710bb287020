//! Change-stream notifications.
//!
//! A batch keeps its records as raw JSON. Each record is converted into a
//! [`StreamNotification`] on its own, so a malformed record is rejected
//! without failing the rest of the batch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::InputError;

/// Token returned once a stream batch has been processed.
pub const STREAM_SUCCESS: &str = "Success";

/// Kind of change carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// A record was created.
    Insert,
    /// A record was updated.
    Modify,
    /// A record was deleted.
    Remove,
}

impl FromStr for EventType {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSERT" => Ok(Self::Insert),
            "MODIFY" => Ok(Self::Modify),
            "REMOVE" => Ok(Self::Remove),
            other => Err(InputError::UnrecognizedEventType(other.to_string())),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "INSERT",
            Self::Modify => "MODIFY",
            Self::Remove => "REMOVE",
        };
        f.write_str(name)
    }
}

/// Key and images of a changed record, in wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamImages {
    #[serde(rename = "Keys", default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Map<String, Value>>,
    #[serde(rename = "NewImage", default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Map<String, Value>>,
    #[serde(rename = "OldImage", default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Map<String, Value>>,
    #[serde(
        rename = "SequenceNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sequence_number: Option<String>,
}

/// One change notification from the upstream change stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamNotification {
    #[serde(rename = "eventID", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(rename = "eventName", default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(default)]
    pub dynamodb: StreamImages,
}

impl StreamNotification {
    /// Read one raw batch record.
    pub fn from_value(record: &Value) -> Result<Self, InputError> {
        Self::deserialize(record).map_err(|e| InputError::malformed(e.to_string()))
    }

    /// Build a notification from its parts.
    pub fn new(
        event_name: impl Into<String>,
        keys: Map<String, Value>,
        old_image: Option<Map<String, Value>>,
        new_image: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            event_id: None,
            event_name: Some(event_name.into()),
            dynamodb: StreamImages {
                keys: Some(keys),
                new_image,
                old_image,
                sequence_number: None,
            },
        }
    }

    /// The parsed event type.
    pub fn event_type(&self) -> Result<EventType, InputError> {
        self.event_name
            .as_deref()
            .ok_or(InputError::MissingEventType)?
            .parse()
    }

    /// The record key in wire format.
    pub fn keys(&self) -> Result<&Map<String, Value>, InputError> {
        self.dynamodb
            .keys
            .as_ref()
            .ok_or_else(|| InputError::missing_field("Keys"))
    }

    pub fn new_image(&self) -> Option<&Map<String, Value>> {
        self.dynamodb.new_image.as_ref()
    }

    pub fn old_image(&self) -> Option<&Map<String, Value>> {
        self.dynamodb.old_image.as_ref()
    }

    /// Identifier used in logs.
    pub fn log_id(&self) -> &str {
        self.event_id
            .as_deref()
            .or(self.dynamodb.sequence_number.as_deref())
            .unwrap_or("-")
    }
}

/// A batch of notifications as delivered by the change stream.
///
/// Records stay raw until [`StreamBatch::notifications`] converts them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<Value>,
}

impl StreamBatch {
    /// Parse a batch payload.
    ///
    /// Only the envelope is checked here: the payload must be a JSON object
    /// whose `Records`, if present, is an array.
    pub fn from_payload(payload: &str) -> Result<Self, InputError> {
        serde_json::from_str(payload).map_err(|e| InputError::malformed(e.to_string()))
    }

    /// Records converted one by one, in batch order.
    pub fn notifications(
        &self,
    ) -> impl Iterator<Item = Result<StreamNotification, InputError>> + '_ {
        self.records.iter().map(StreamNotification::from_value)
    }
}
