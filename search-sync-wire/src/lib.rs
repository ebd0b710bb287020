//! # Search Sync Wire
//!
//! The primary store exports and streams records as recursive tagged values
//! (`{"S": "text"}`, `{"N": "1.50"}`, `{"M": {...}}`, ...). This crate owns
//! that wire format:
//!
//! - [`WireAttributeValue`]: closed variant type, one variant per tag
//! - [`normalize`]: rewrites alternate tag spellings to the canonical names
//! - [`decode`] / [`encode`]: conversion to and from canonical JSON
//! - [`ion`]: transcoder for the line-delimited Ion text export

pub mod attribute_value;
pub mod decode;
pub mod errors;
pub mod ion;
pub mod normalize;

pub use attribute_value::WireAttributeValue;
pub use decode::{decode, decode_attribute, decode_item, decode_json, encode, encode_item};
pub use errors::DecodeError;
pub use normalize::{normalize_attribute, normalize_item};
