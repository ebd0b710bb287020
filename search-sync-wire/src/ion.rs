//! Transcoder for line-delimited Ion text exports.
//!
//! The Ion export writes one record per line, e.g.
//!
//! ```text
//! $ion_1_0 {Item:{id:"abc",count:5.,tags:$dynamodb_SS::["a","b"],thumb:{{aGk=}}}}
//! ```
//!
//! Values are native Ion rather than tagged, with sets marked by
//! `$dynamodb_SS`/`$dynamodb_NS`/`$dynamodb_BS` annotations. The transcoder
//! parses the subset of Ion text such exports use and rewrites it into the
//! tagged JSON wire form, so both export formats share one decoder.
//! Timestamps, s-expressions, clobs and special floats are rejected.

use serde_json::{Map, Number, Value};

use crate::attribute_value::tags;
use crate::errors::DecodeError;

/// Ion version marker that may precede records or stand on its own line.
pub const VERSION_MARKER: &str = "$ion_1_0";
const STRING_SET: &str = "$dynamodb_SS";
const NUMBER_SET: &str = "$dynamodb_NS";
const BINARY_SET: &str = "$dynamodb_BS";

/// Transcode one Ion text record into wire-format JSON text.
pub fn transcode_line(line: &str) -> Result<String, DecodeError> {
    to_wire_record(line).map(|record| Value::Object(record).to_string())
}

/// Transcode one Ion text record into a wire-format JSON object.
///
/// Top-level struct fields holding structs (such as `Item`) become attribute
/// maps; any other top-level field becomes a single tagged value.
pub fn to_wire_record(line: &str) -> Result<Map<String, Value>, DecodeError> {
    let mut reader = Reader::new(line);
    let top = reader.read_record()?;

    let IonValue::Struct(fields) = top.value else {
        return Err(DecodeError::transcode(0, "record is not a struct"));
    };

    fields
        .into_iter()
        .map(|(name, field)| {
            let value = match field.value {
                IonValue::Struct(attributes) => Value::Object(
                    attributes
                        .into_iter()
                        .map(|(attr, v)| to_wire(v).map(|w| (attr, w)))
                        .collect::<Result<_, _>>()?,
                ),
                _ => to_wire(field)?,
            };
            Ok((name, value))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
enum IonValue {
    Null,
    Bool(bool),
    Number(String),
    String(String),
    Symbol(String),
    Blob(String),
    List(Vec<Annotated>),
    Struct(Vec<(String, Annotated)>),
}

#[derive(Debug, Clone, PartialEq)]
struct Annotated {
    annotations: Vec<String>,
    value: IonValue,
}

fn to_wire(item: Annotated) -> Result<Value, DecodeError> {
    let set_tag = item.annotations.iter().find_map(|a| match a.as_str() {
        STRING_SET => Some(tags::STRING_SET),
        NUMBER_SET => Some(tags::NUMBER_SET),
        BINARY_SET => Some(tags::BINARY_SET),
        _ => None,
    });

    let (tag, payload) = match (set_tag, item.value) {
        (Some(tag), IonValue::List(members)) => {
            let members = members
                .into_iter()
                .map(|m| set_member(tag, m.value))
                .collect::<Result<_, _>>()?;
            (tag, Value::Array(members))
        }
        (Some(tag), _) => {
            return Err(DecodeError::transcode(0, format!("{} annotation on a non-list", tag)))
        }
        (None, IonValue::Null) => (tags::NULL, Value::Bool(true)),
        (None, IonValue::Bool(b)) => (tags::BOOL, Value::Bool(b)),
        (None, IonValue::Number(n)) => (tags::NUMBER, Value::String(n)),
        (None, IonValue::String(s)) | (None, IonValue::Symbol(s)) => {
            (tags::STRING, Value::String(s))
        }
        (None, IonValue::Blob(b)) => (tags::BINARY, Value::String(b)),
        (None, IonValue::List(items)) => (
            tags::LIST,
            Value::Array(items.into_iter().map(to_wire).collect::<Result<_, _>>()?),
        ),
        (None, IonValue::Struct(fields)) => (
            tags::MAP,
            Value::Object(
                fields
                    .into_iter()
                    .map(|(name, v)| to_wire(v).map(|w| (name, w)))
                    .collect::<Result<_, _>>()?,
            ),
        ),
    };

    let mut object = Map::with_capacity(1);
    object.insert(tag.to_string(), payload);
    Ok(Value::Object(object))
}

fn set_member(tag: &str, value: IonValue) -> Result<Value, DecodeError> {
    match (tag, value) {
        (tags::STRING_SET, IonValue::String(s)) | (tags::STRING_SET, IonValue::Symbol(s)) => {
            Ok(Value::String(s))
        }
        (tags::NUMBER_SET, IonValue::Number(n)) => Ok(Value::String(n)),
        (tags::BINARY_SET, IonValue::Blob(b)) => Ok(Value::String(b)),
        (tag, other) => Err(DecodeError::transcode(
            0,
            format!("unexpected {:?} in {} set", other, tag),
        )),
    }
}

struct Reader<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn error(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::transcode(self.pos, reason)
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, wanted: char) -> Result<(), DecodeError> {
        match self.bump() {
            Some(c) if c == wanted => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", wanted, c))),
            None => Err(self.error(format!("expected '{}', found end of input", wanted))),
        }
    }

    fn skip_whitespace(&mut self) -> Result<(), DecodeError> {
        loop {
            let rest = self.rest();
            if rest.starts_with("//") {
                self.pos += rest.find('\n').unwrap_or(rest.len());
            } else if rest.starts_with("/*") {
                let end = rest[2..]
                    .find("*/")
                    .ok_or_else(|| self.error("unterminated block comment"))?;
                self.pos += end + 4;
            } else {
                match self.peek() {
                    Some(c) if c.is_whitespace() => self.pos += c.len_utf8(),
                    _ => return Ok(()),
                }
            }
        }
    }

    fn read_record(&mut self) -> Result<Annotated, DecodeError> {
        self.skip_whitespace()?;
        while self.rest().starts_with(VERSION_MARKER)
            && !self.rest()[VERSION_MARKER.len()..]
                .chars()
                .next()
                .is_some_and(is_identifier_char)
        {
            self.pos += VERSION_MARKER.len();
            self.skip_whitespace()?;
        }

        let value = self.read_value()?;
        self.skip_whitespace()?;
        if self.pos != self.text.len() {
            return Err(self.error("trailing content after record"));
        }
        Ok(value)
    }

    fn read_value(&mut self) -> Result<Annotated, DecodeError> {
        let mut annotations = Vec::new();
        loop {
            self.skip_whitespace()?;
            let start = self.pos;
            let symbol = match self.peek() {
                Some('\'') if !self.rest().starts_with("'''") => Some(self.read_quoted('\'')?),
                Some(c) if is_identifier_start(c) => Some(self.read_identifier()),
                _ => None,
            };
            let Some(symbol) = symbol else { break };

            self.skip_whitespace()?;
            if self.rest().starts_with("::") {
                self.pos += 2;
                annotations.push(symbol);
            } else {
                self.pos = start;
                break;
            }
        }

        let value = self.read_bare_value()?;
        Ok(Annotated { annotations, value })
    }

    fn read_bare_value(&mut self) -> Result<IonValue, DecodeError> {
        match self.peek() {
            Some('{') if self.rest().starts_with("{{") => self.read_blob(),
            Some('{') => self.read_struct(),
            Some('[') => self.read_list(),
            Some('(') => Err(self.error("s-expressions are not supported")),
            Some('"') => self.read_quoted('"').map(IonValue::String),
            Some('\'') if self.rest().starts_with("'''") => {
                self.read_long_string().map(IonValue::String)
            }
            Some('\'') => self.read_quoted('\'').map(IonValue::Symbol),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => self.read_number(),
            Some(c) if is_identifier_start(c) => {
                let word = self.read_identifier();
                match word.as_str() {
                    "true" => Ok(IonValue::Bool(true)),
                    "false" => Ok(IonValue::Bool(false)),
                    "null" => {
                        if self.peek() == Some('.') {
                            self.pos += 1;
                            self.read_identifier();
                        }
                        Ok(IonValue::Null)
                    }
                    "nan" => Err(self.error("nan is not a decimal number")),
                    _ => Ok(IonValue::Symbol(word)),
                }
            }
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn read_identifier(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_identifier_char) {
            self.pos += 1;
        }
        self.text[start..self.pos].to_string()
    }

    fn read_struct(&mut self) -> Result<IonValue, DecodeError> {
        self.expect('{')?;
        let mut fields = Vec::new();

        loop {
            self.skip_whitespace()?;
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(IonValue::Struct(fields));
            }

            let name = match self.peek() {
                Some('"') => self.read_quoted('"')?,
                Some('\'') if self.rest().starts_with("'''") => self.read_long_string()?,
                Some('\'') => self.read_quoted('\'')?,
                Some(c) if is_identifier_start(c) => self.read_identifier(),
                _ => return Err(self.error("expected field name")),
            };

            self.skip_whitespace()?;
            self.expect(':')?;
            let value = self.read_value()?;
            fields.push((name, value));

            self.skip_whitespace()?;
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(IonValue::Struct(fields)),
                _ => return Err(self.error("expected ',' or '}' in struct")),
            }
        }
    }

    fn read_list(&mut self) -> Result<IonValue, DecodeError> {
        self.expect('[')?;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace()?;
            if self.peek() == Some(']') {
                self.pos += 1;
                return Ok(IonValue::List(items));
            }

            items.push(self.read_value()?);

            self.skip_whitespace()?;
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(IonValue::List(items)),
                _ => return Err(self.error("expected ',' or ']' in list")),
            }
        }
    }

    fn read_blob(&mut self) -> Result<IonValue, DecodeError> {
        self.pos += 2;
        let rest = self.rest();
        let end = rest
            .find("}}")
            .ok_or_else(|| self.error("unterminated blob"))?;
        let content = &rest[..end];

        if content.trim_start().starts_with('"') || content.trim_start().starts_with('\'') {
            return Err(self.error("clobs are not supported"));
        }

        let data: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        self.pos += end + 2;
        Ok(IonValue::Blob(data))
    }

    fn read_long_string(&mut self) -> Result<String, DecodeError> {
        let mut out = String::new();
        loop {
            self.pos += 3;
            loop {
                if self.rest().starts_with("'''") {
                    self.pos += 3;
                    break;
                }
                match self.bump() {
                    Some('\\') => self.read_escape(&mut out)?,
                    Some(c) => out.push(c),
                    None => return Err(self.error("unterminated long string")),
                }
            }

            let resume = self.pos;
            self.skip_whitespace()?;
            if !self.rest().starts_with("'''") {
                self.pos = resume;
                return Ok(out);
            }
        }
    }

    fn read_quoted(&mut self, quote: char) -> Result<String, DecodeError> {
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.read_escape(&mut out)?,
                Some('\n') => return Err(self.error("newline in quoted text")),
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated quoted text")),
            }
        }
    }

    fn read_escape(&mut self, out: &mut String) -> Result<(), DecodeError> {
        let c = self
            .bump()
            .ok_or_else(|| self.error("unterminated escape"))?;
        let decoded = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'a' => '\u{07}',
            'b' => '\u{08}',
            'v' => '\u{0B}',
            'f' => '\u{0C}',
            '"' | '\'' | '\\' | '/' | '?' => c,
            '\n' => return Ok(()),
            'x' => self.read_code_point(2)?,
            'u' => {
                let unit = self.read_hex(4)?;
                if (0xD800..0xDC00).contains(&unit) && self.rest().starts_with("\\u") {
                    self.pos += 2;
                    let low = self.read_hex(4)?;
                    let combined = 0x10000 + ((unit - 0xD800) << 10) + (low.wrapping_sub(0xDC00));
                    char::from_u32(combined).ok_or_else(|| self.error("invalid surrogate pair"))?
                } else {
                    char::from_u32(unit).ok_or_else(|| self.error("invalid code point"))?
                }
            }
            'U' => self.read_code_point(8)?,
            other => return Err(self.error(format!("invalid escape '\\{}'", other))),
        };
        out.push(decoded);
        Ok(())
    }

    fn read_hex(&mut self, digits: usize) -> Result<u32, DecodeError> {
        let rest = self.rest();
        let hex = rest
            .get(..digits)
            .ok_or_else(|| self.error("truncated escape"))?;
        let value = u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid hex escape"))?;
        self.pos += digits;
        Ok(value)
    }

    fn read_code_point(&mut self, digits: usize) -> Result<char, DecodeError> {
        let value = self.read_hex(digits)?;
        char::from_u32(value).ok_or_else(|| self.error("invalid code point"))
    }

    fn read_number(&mut self) -> Result<IonValue, DecodeError> {
        let start = self.pos;
        let mut previous = None;
        while let Some(c) = self.peek() {
            let sign_after_exponent =
                (c == '-' || c == '+') && matches!(previous, Some('e' | 'E' | 'd' | 'D'));
            let leading_sign = (c == '-' || c == '+') && self.pos == start;
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || sign_after_exponent || leading_sign
            {
                self.pos += 1;
                previous = Some(c);
            } else {
                break;
            }
        }

        let token = &self.text[start..self.pos];
        decimal_text(token)
            .map(IonValue::Number)
            .ok_or_else(|| DecodeError::transcode(start, format!("unsupported number '{}'", token)))
    }
}

/// Rewrite an Ion numeric literal as a JSON-compatible decimal literal.
fn decimal_text(token: &str) -> Option<String> {
    let cleaned: String = token.chars().filter(|c| *c != '_').collect();
    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(body) => (true, body),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let sign = if negative { "-" } else { "" };

    let radix = if body.starts_with("0x") || body.starts_with("0X") {
        Some(16)
    } else if body.starts_with("0b") || body.starts_with("0B") {
        Some(2)
    } else {
        None
    };
    if let Some(radix) = radix {
        let value = i128::from_str_radix(&body[2..], radix).ok()?;
        return Some(format!("{}{}", sign, value));
    }

    let normalized = body.replace(|c: char| c == 'd' || c == 'D', "e");
    let (mantissa, exponent) = match normalized.split_once(|c: char| c == 'e' || c == 'E') {
        Some((m, e)) => (m, Some(e)),
        None => (normalized.as_str(), None),
    };
    let mantissa = mantissa.strip_suffix('.').unwrap_or(mantissa);

    let text = match exponent {
        Some(exponent) => format!("{}{}e{}", sign, mantissa, exponent),
        None => format!("{}{}", sign, mantissa),
    };

    serde_json::from_str::<Number>(&text).ok()?;
    Some(text)
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transcode_export_line() {
        let record = to_wire_record(
            r#"$ion_1_0 {Item:{id:"abc",status:"published",count:5.,price:1.50,ratio:2d-1,active:true,gone:null,tags:$dynamodb_SS::["a","b","a"],years:$dynamodb_NS::[1999,2001],thumb:{{aGVsbG8=}},parts:[1,"x"],meta:{nested:null.string}}}"#,
        )
        .unwrap();

        assert_eq!(
            Value::Object(record),
            json!({
                "Item": {
                    "id": {"S": "abc"},
                    "status": {"S": "published"},
                    "count": {"N": "5"},
                    "price": {"N": "1.50"},
                    "ratio": {"N": "2e-1"},
                    "active": {"BOOL": true},
                    "gone": {"NULL": true},
                    "tags": {"SS": ["a", "b", "a"]},
                    "years": {"NS": ["1999", "2001"]},
                    "thumb": {"B": "aGVsbG8="},
                    "parts": {"L": [{"N": "1"}, {"S": "x"}]},
                    "meta": {"M": {"nested": {"NULL": true}}}
                }
            })
        );
    }

    #[test]
    fn test_transcode_line_is_json_text() {
        let text = transcode_line(r#"{Item:{'quoted name':"v"}}"#).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!({"Item": {"quoted name": {"S": "v"}}}));
    }

    #[test]
    fn test_transcode_escapes_and_long_strings() {
        let record = to_wire_record(
            r#"{Item:{a:"tab\there \u00e9 \"q\"",b:'''one ''' '''two''',c:"\U0001F600"}}"#,
        )
        .unwrap();

        assert_eq!(record["Item"]["a"]["S"], "tab\there é \"q\"");
        assert_eq!(record["Item"]["b"]["S"], "one two");
        assert_eq!(record["Item"]["c"]["S"], "😀");
    }

    #[test]
    fn test_transcode_numbers() {
        assert_eq!(decimal_text("5."), Some("5".to_string()));
        assert_eq!(decimal_text("-0.25"), Some("-0.25".to_string()));
        assert_eq!(decimal_text("1_000"), Some("1000".to_string()));
        assert_eq!(decimal_text("0x1F"), Some("31".to_string()));
        assert_eq!(decimal_text("-0b101"), Some("-5".to_string()));
        assert_eq!(decimal_text("1.5e3"), Some("1.5e3".to_string()));
        assert_eq!(decimal_text("12d-2"), Some("12e-2".to_string()));
        assert_eq!(decimal_text("2020-01-01T"), None);
        assert_eq!(decimal_text("+inf"), None);
    }

    #[test]
    fn test_transcode_comments_and_annotations() {
        let record = to_wire_record(
            "/* header */ {Item:{ // trailing\n kind:my_annotation::\"v\"}}",
        )
        .unwrap();
        assert_eq!(record["Item"]["kind"], json!({"S": "v"}));
    }

    #[test]
    fn test_transcode_rejects_unsupported() {
        assert!(to_wire_record("{Item:{a:(1 2)}}").is_err());
        assert!(to_wire_record("{Item:{a:{{\"clob\"}}}}").is_err());
        assert!(to_wire_record("{Item:{a:2020-01-01T}}").is_err());
        assert!(to_wire_record("{Item:{a:\"open}}").is_err());
        assert!(to_wire_record("[1, 2]").is_err());
        assert!(to_wire_record("{Item:{a:1}} extra").is_err());
    }

    #[test]
    fn test_set_annotation_requires_list() {
        let err = to_wire_record("{Item:{a:$dynamodb_SS::\"x\"}}").unwrap_err();
        assert!(matches!(err, DecodeError::Transcode { .. }));
    }
}
