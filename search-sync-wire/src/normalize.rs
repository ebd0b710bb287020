//! Tag normalization.
//!
//! Two spellings of several tags exist in the wild: exports written by some
//! SDKs use lower-case tag names, and one export format spells the boolean
//! tag `BOOLEAN`. Normalization rewrites tag keys to the canonical names and
//! leaves attribute names untouched. Two populated spellings of one tag in the
//! same value are rejected.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::attribute_value::tags;
use crate::errors::DecodeError;

/// Canonical name for a tag key.
pub fn canonical_tag(tag: &str) -> String {
    let upper = tag.to_ascii_uppercase();
    match upper.as_str() {
        "BOOLEAN" => tags::BOOL.to_string(),
        _ => upper,
    }
}

/// Normalize one tagged value, recursing into `M` and `L` payloads.
pub fn normalize_attribute(value: Value) -> Result<Value, DecodeError> {
    let Value::Object(object) = value else {
        return Ok(value);
    };

    let mut normalized = Map::with_capacity(object.len());
    let mut spellings: HashMap<String, String> = HashMap::with_capacity(object.len());
    for (spelling, payload) in object {
        let tag = canonical_tag(&spelling);
        let payload = match (tag.as_str(), payload) {
            (tags::MAP, Value::Object(entries)) => Value::Object(normalize_item(entries)?),
            (tags::LIST, Value::Array(items)) => Value::Array(
                items
                    .into_iter()
                    .map(normalize_attribute)
                    .collect::<Result<_, _>>()?,
            ),
            (_, payload) => payload,
        };

        match normalized.get(&tag) {
            Some(_) if payload.is_null() => continue,
            Some(existing) if !existing.is_null() => {
                let first = spellings.remove(&tag).unwrap_or_else(|| tag.clone());
                return Err(DecodeError::MultiplePopulatedTags(vec![first, spelling]));
            }
            _ => {}
        }
        spellings.insert(tag.clone(), spelling);
        normalized.insert(tag, payload);
    }
    Ok(Value::Object(normalized))
}

/// Normalize a record: a map of attribute names to tagged values.
pub fn normalize_item(item: Map<String, Value>) -> Result<Map<String, Value>, DecodeError> {
    item.into_iter()
        .map(|(name, value)| {
            normalize_attribute(value)
                .map(|value| (name.clone(), value))
                .map_err(|e| e.in_field(name))
        })
        .collect()
}
