//! Conversion between structured values and the bytes the codec consumes.
//!
//! Values are [`serde_json::Value`]: a closed set of variants (null, bool,
//! number, string, array, object) that cannot hold cycles or non-finite
//! numbers, so [`serialize`] is total over its input type.
//!
//! Output is compact JSON with object keys in sorted order, so equal values
//! always serialise to equal bytes. Both directions share the same nesting
//! bound, and parsing rejects objects that repeat a key.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Deepest array/object nesting accepted in either direction. Matches the
/// parser's recursion limit.
pub const MAX_DEPTH: usize = 127;

/// Errors from the payload adapter. These describe data-shape problems and
/// are safe to report to the caller in full.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Input was not valid JSON, or JSON that could not be written.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Value nests arrays or objects deeper than [`MAX_DEPTH`].
    #[error("payload nests deeper than {max} levels")]
    TooDeep { max: usize },

    /// A binary field was expected as base64 text but was another variant.
    #[error("expected a base64 string, found {0}")]
    NotAString(&'static str),

    /// A binary field was a string but not valid base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Encode `value` as canonical compact JSON bytes.
///
/// # Errors
///
/// Returns [`SerializationError::TooDeep`] when `value` could not be parsed
/// back by [`deserialize`].
pub fn serialize(value: &Value) -> Result<Vec<u8>, SerializationError> {
    if exceeds_depth(value, MAX_DEPTH) {
        return Err(SerializationError::TooDeep { max: MAX_DEPTH });
    }
    Ok(serde_json::to_vec(value)?)
}

fn exceeds_depth(value: &Value, budget: usize) -> bool {
    match value {
        Value::Array(items) => match budget.checked_sub(1) {
            None => true,
            Some(rest) => items.iter().any(|item| exceeds_depth(item, rest)),
        },
        Value::Object(map) => match budget.checked_sub(1) {
            None => true,
            Some(rest) => map.values().any(|item| exceeds_depth(item, rest)),
        },
        _ => false,
    }
}

/// Parse JSON bytes back into a [`Value`].
///
/// # Errors
///
/// Returns [`SerializationError::Json`] with line and column detail on
/// malformed input, including trailing data after the value and objects
/// that repeat a key.
pub fn deserialize(bytes: &[u8]) -> Result<Value, SerializationError> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    let UniqueKeys(value) = UniqueKeys::deserialize(&mut de)?;
    de.end()?;
    Ok(value)
}

/// A [`Value`] whose objects were built without overwriting any key.
struct UniqueKeys(Value);

impl<'de> Deserialize<'de> for UniqueKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(UniqueKeysVisitor).map(UniqueKeys)
    }
}

struct UniqueKeysVisitor;

impl<'de> Visitor<'de> for UniqueKeysVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| E::custom("non-finite number"))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(UniqueKeys(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::new();
        while let Some(key) = access.next_key::<String>()? {
            if map.contains_key(&key) {
                return Err(de::Error::custom(format_args!("duplicate key `{key}`")));
            }
            let UniqueKeys(value) = access.next_value()?;
            map.insert(key, value);
        }
        Ok(Value::Object(map))
    }
}

/// Reduce raw bytes (an image, an audio clip, a multipart part) to a
/// JSON-representable base64 string.
pub fn binary_to_value(bytes: &[u8]) -> Value {
    Value::String(STANDARD.encode(bytes))
}

/// Inverse of [`binary_to_value`].
pub fn value_to_binary(value: &Value) -> Result<Vec<u8>, SerializationError> {
    match value {
        Value::String(s) => Ok(STANDARD.decode(s)?),
        other => Err(SerializationError::NotAString(variant_name(other))),
    }
}

fn variant_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
