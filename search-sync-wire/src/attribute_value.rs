//! The wire-format value model.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::errors::DecodeError;
use crate::normalize::normalize_attribute;

/// Canonical tag names.
pub mod tags {
    pub const NULL: &str = "NULL";
    pub const BOOL: &str = "BOOL";
    pub const STRING: &str = "S";
    pub const NUMBER: &str = "N";
    pub const BINARY: &str = "B";
    pub const STRING_SET: &str = "SS";
    pub const NUMBER_SET: &str = "NS";
    pub const BINARY_SET: &str = "BS";
    pub const LIST: &str = "L";
    pub const MAP: &str = "M";

    /// Every tag of the wire format.
    pub const ALL: [&str; 10] = [
        NULL, BOOL, STRING, NUMBER, BINARY, STRING_SET, NUMBER_SET, BINARY_SET, LIST, MAP,
    ];
}

/// One wire-format value. Exactly one tag is populated by construction.
///
/// Numbers and binaries keep their textual payload (decimal literal and base64)
/// so nothing is lost before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireAttributeValue {
    Null,
    Bool(bool),
    String(String),
    Number(String),
    Binary(String),
    StringSet(Vec<String>),
    NumberSet(Vec<String>),
    BinarySet(Vec<String>),
    List(Vec<WireAttributeValue>),
    /// Entries in source order.
    Map(Vec<(String, WireAttributeValue)>),
}

impl WireAttributeValue {
    /// The canonical tag of this value.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Null => tags::NULL,
            Self::Bool(_) => tags::BOOL,
            Self::String(_) => tags::STRING,
            Self::Number(_) => tags::NUMBER,
            Self::Binary(_) => tags::BINARY,
            Self::StringSet(_) => tags::STRING_SET,
            Self::NumberSet(_) => tags::NUMBER_SET,
            Self::BinarySet(_) => tags::BINARY_SET,
            Self::List(_) => tags::LIST,
            Self::Map(_) => tags::MAP,
        }
    }

    /// Read a tagged JSON object that has already been normalized.
    ///
    /// A tag whose payload is JSON `null` counts as unpopulated, as does
    /// `NULL: false`. Zero or several populated tags are rejected.
    pub fn from_json(value: &Value) -> Result<Self, DecodeError> {
        let object = value
            .as_object()
            .ok_or_else(|| DecodeError::NotTagged(json_type(value).to_string()))?;

        let mut populated = Vec::with_capacity(1);
        let mut false_null = false;

        for (tag, payload) in object {
            if !tags::ALL.contains(&tag.as_str()) {
                return Err(DecodeError::UnknownTag(tag.clone()));
            }
            if payload.is_null() {
                continue;
            }
            if tag == tags::NULL && payload == &Value::Bool(false) {
                false_null = true;
                continue;
            }
            populated.push((tag.as_str(), payload));
        }

        match populated.as_slice() {
            [] if false_null => Err(DecodeError::FalseNull),
            [] => Err(DecodeError::NoPopulatedTag),
            [(tag, payload)] => Self::from_tagged(tag, payload),
            many => Err(DecodeError::MultiplePopulatedTags(
                many.iter().map(|(tag, _)| tag.to_string()).collect(),
            )),
        }
    }

    fn from_tagged(tag: &str, payload: &Value) -> Result<Self, DecodeError> {
        match tag {
            tags::NULL => match payload {
                Value::Bool(true) => Ok(Self::Null),
                other => Err(DecodeError::invalid_payload(
                    tag,
                    format!("expected true, found {}", json_type(other)),
                )),
            },
            tags::BOOL => payload
                .as_bool()
                .map(Self::Bool)
                .ok_or_else(|| expected(tag, "boolean", payload)),
            tags::STRING => string_payload(tag, payload).map(Self::String),
            tags::NUMBER => number_text(tag, payload).map(Self::Number),
            tags::BINARY => string_payload(tag, payload).map(Self::Binary),
            tags::STRING_SET => array_payload(tag, payload)?
                .iter()
                .map(|item| string_payload(tag, item))
                .collect::<Result<_, _>>()
                .map(Self::StringSet),
            tags::NUMBER_SET => array_payload(tag, payload)?
                .iter()
                .map(|item| number_text(tag, item))
                .collect::<Result<_, _>>()
                .map(Self::NumberSet),
            tags::BINARY_SET => array_payload(tag, payload)?
                .iter()
                .map(|item| string_payload(tag, item))
                .collect::<Result<_, _>>()
                .map(Self::BinarySet),
            tags::LIST => array_payload(tag, payload)?
                .iter()
                .enumerate()
                .map(|(i, item)| Self::from_json(item).map_err(|e| e.in_field(format!("[{}]", i))))
                .collect::<Result<_, _>>()
                .map(Self::List),
            tags::MAP => payload
                .as_object()
                .ok_or_else(|| expected(tag, "object", payload))?
                .iter()
                .map(|(name, item)| {
                    Self::from_json(item)
                        .map(|v| (name.clone(), v))
                        .map_err(|e| e.in_field(name.clone()))
                })
                .collect::<Result<_, _>>()
                .map(Self::Map),
            other => Err(DecodeError::UnknownTag(other.to_string())),
        }
    }

    /// Canonical tagged JSON form of this value.
    pub fn to_json(&self) -> Value {
        let payload = match self {
            Self::Null => Value::Bool(true),
            Self::Bool(b) => Value::Bool(*b),
            Self::String(s) | Self::Number(s) | Self::Binary(s) => Value::String(s.clone()),
            Self::StringSet(items) | Self::NumberSet(items) | Self::BinarySet(items) => {
                Value::Array(items.iter().cloned().map(Value::String).collect())
            }
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
        };

        let mut object = Map::with_capacity(1);
        object.insert(self.tag().to_string(), payload);
        Value::Object(object)
    }
}

impl Serialize for WireAttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WireAttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        normalize_attribute(raw)
            .and_then(|normalized| Self::from_json(&normalized))
            .map_err(serde::de::Error::custom)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected(tag: &str, wanted: &str, found: &Value) -> DecodeError {
    DecodeError::invalid_payload(tag, format!("expected {}, found {}", wanted, json_type(found)))
}

fn string_payload(tag: &str, payload: &Value) -> Result<String, DecodeError> {
    payload
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| expected(tag, "string", payload))
}

// Some producers emit numbers as bare JSON numbers instead of strings; with
// arbitrary precision enabled their text is still exact.
fn number_text(tag: &str, payload: &Value) -> Result<String, DecodeError> {
    match payload {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(expected(tag, "string", other)),
    }
}

fn array_payload<'a>(tag: &str, payload: &'a Value) -> Result<&'a Vec<Value>, DecodeError> {
    payload
        .as_array()
        .ok_or_else(|| expected(tag, "array", payload))
}
