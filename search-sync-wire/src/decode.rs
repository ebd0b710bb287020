//! Conversion between wire-format values and canonical documents.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Number, Value};

use crate::attribute_value::WireAttributeValue;
use crate::errors::DecodeError;
use crate::normalize::normalize_attribute;

/// Decode a wire value into canonical JSON.
///
/// Sets and lists become arrays in source order (duplicates kept), maps keep
/// their key order, numbers keep their exact decimal text and binaries stay
/// base64 text.
pub fn decode(value: &WireAttributeValue) -> Result<Value, DecodeError> {
    match value {
        WireAttributeValue::Null => Ok(Value::Null),
        WireAttributeValue::Bool(b) => Ok(Value::Bool(*b)),
        WireAttributeValue::String(s) => Ok(Value::String(s.clone())),
        WireAttributeValue::Number(text) => parse_number(text).map(Value::Number),
        WireAttributeValue::Binary(data) => check_binary(data).map(Value::String),
        WireAttributeValue::StringSet(items) => {
            Ok(Value::Array(items.iter().cloned().map(Value::String).collect()))
        }
        WireAttributeValue::NumberSet(items) => items
            .iter()
            .map(|text| parse_number(text).map(Value::Number))
            .collect::<Result<_, _>>()
            .map(Value::Array),
        WireAttributeValue::BinarySet(items) => items
            .iter()
            .map(|data| check_binary(data).map(Value::String))
            .collect::<Result<_, _>>()
            .map(Value::Array),
        WireAttributeValue::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| decode(item).map_err(|e| e.in_field(format!("[{}]", i))))
            .collect::<Result<_, _>>()
            .map(Value::Array),
        WireAttributeValue::Map(entries) => entries
            .iter()
            .map(|(name, item)| {
                decode(item)
                    .map(|v| (name.clone(), v))
                    .map_err(|e| e.in_field(name.clone()))
            })
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),
    }
}

/// Normalize, read and decode a single tagged JSON value.
pub fn decode_json(value: &Value) -> Result<Value, DecodeError> {
    let normalized = normalize_attribute(value.clone())?;
    decode(&WireAttributeValue::from_json(&normalized)?)
}

/// Decode a whole record (attribute name → tagged value) into a document.
pub fn decode_item(item: &Map<String, Value>) -> Result<Value, DecodeError> {
    item.iter()
        .map(|(name, value)| {
            normalize_attribute(value.clone())
                .and_then(|v| WireAttributeValue::from_json(&v))
                .and_then(|v| decode(&v))
                .map(|v| (name.clone(), v))
                .map_err(|e| e.in_field(name.clone()))
        })
        .collect::<Result<Map<_, _>, _>>()
        .map(Value::Object)
}

/// Decode one attribute of a record without touching the others.
///
/// Returns `Ok(None)` when the record has no such attribute.
pub fn decode_attribute(item: &Map<String, Value>, name: &str) -> Result<Option<Value>, DecodeError> {
    item.get(name)
        .map(|value| decode_json(value).map_err(|e| e.in_field(name)))
        .transpose()
}

/// Canonical re-encoding of a document into wire form.
///
/// Arrays encode as lists and objects as maps; decoding the result yields the
/// original document.
pub fn encode(value: &Value) -> WireAttributeValue {
    match value {
        Value::Null => WireAttributeValue::Null,
        Value::Bool(b) => WireAttributeValue::Bool(*b),
        Value::Number(n) => WireAttributeValue::Number(n.to_string()),
        Value::String(s) => WireAttributeValue::String(s.clone()),
        Value::Array(items) => WireAttributeValue::List(items.iter().map(encode).collect()),
        Value::Object(entries) => WireAttributeValue::Map(
            entries
                .iter()
                .map(|(name, item)| (name.clone(), encode(item)))
                .collect(),
        ),
    }
}

/// Encode a document's top-level fields as a wire record.
pub fn encode_item(document: &Map<String, Value>) -> Map<String, Value> {
    document
        .iter()
        .map(|(name, value)| (name.clone(), encode(value).to_json()))
        .collect()
}

fn parse_number(text: &str) -> Result<Number, DecodeError> {
    let trimmed = text.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    serde_json::from_str::<Number>(unsigned).map_err(|_| DecodeError::InvalidNumber(text.to_string()))
}

fn check_binary(data: &str) -> Result<String, DecodeError> {
    STANDARD
        .decode(data)
        .map(|_| data.to_string())
        .map_err(|e| DecodeError::InvalidBinary(e.to_string()))
}
