//! Property codec
//!
//! Converts typed property maps into string maps that fit in mDNS TXT
//! records, and back.
//!
//! Strings pass through unchanged unless they would read back as something
//! else, in which case they are written as a JSON string literal. Everything
//! else is written as JSON when JSON can represent it, otherwise in the
//! tagged form `typed:<tag>:<repr>`.
//! Tagged forms are read back through a closed table of decoders; unknown
//! tags are rejected rather than interpreted.

use std::collections::{BTreeMap, BTreeSet};

use crate::value::Value;
use crate::{Error, Result};

/// Prefix of the tagged fallback encoding
pub const TAG_MARKER: &str = "typed";

type Decoder = fn(&str) -> Result<Value>;

/// Closed registry of tagged decoders
const DECODERS: &[(&str, Decoder)] = &[
    ("char", decode_char),
    ("float", decode_float),
    ("set", decode_set),
    ("xml", decode_xml),
];

/// Serialize every property into its transport form
///
/// Entries that cannot be encoded are logged and skipped.
#[must_use]
pub fn serialize_properties(props: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    props
        .iter()
        .filter_map(|(key, value)| match serialize_value(value) {
            Ok(encoded) => Some((key.clone(), encoded)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "skipping unencodable property");
                None
            }
        })
        .collect()
}

/// Deserialize every property from its transport form
///
/// Entries that cannot be decoded are logged and skipped.
#[must_use]
pub fn deserialize_properties(props: &BTreeMap<String, String>) -> BTreeMap<String, Value> {
    props
        .iter()
        .filter_map(|(key, raw)| match deserialize_value(raw) {
            Ok(value) => Some((key.clone(), value)),
            Err(e) => {
                tracing::error!(key = %key, value = %raw, error = %e, "can't deserialize property");
                None
            }
        })
        .collect()
}

/// Serialize a single value
///
/// # Errors
///
/// Returns an encode error if neither JSON nor a tagged form can hold it
pub fn serialize_value(value: &Value) -> Result<String> {
    if let Value::String(s) = value {
        return Ok(match deserialize_value(s) {
            Ok(Value::String(decoded)) if decoded == *s => s.clone(),
            _ => serde_json::to_string(s)?,
        });
    }

    if let Some(json) = canonical_json(value) {
        return Ok(json.to_string());
    }

    let repr = match value {
        Value::Char(c) => c.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Xml(markup) => markup.clone(),
        Value::Set(items) => {
            let members = items
                .iter()
                .map(|item| scalar_json(item).ok_or_else(|| unencodable(item)))
                .collect::<Result<Vec<_>>>()?;
            serde_json::Value::Array(members).to_string()
        }
        other => return Err(unencodable(other)),
    };

    Ok(format!("{TAG_MARKER}:{}:{repr}", value.type_name()))
}

/// Deserialize a single value
///
/// JSON is tried first; text that is neither JSON nor a tagged form is a
/// plain string.
///
/// # Errors
///
/// Returns a decode error for an unknown tag or a malformed payload
pub fn deserialize_value(raw: &str) -> Result<Value> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(raw) {
        return Ok(Value::from_json(&json));
    }

    let Some(tagged) = raw
        .strip_prefix(TAG_MARKER)
        .and_then(|rest| rest.strip_prefix(':'))
    else {
        return Ok(Value::String(raw.to_string()));
    };

    let (tag, repr) = tagged
        .split_once(':')
        .ok_or_else(|| Error::Decode(format!("tagged value without payload: {raw}")))?;

    let decoder = DECODERS
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, decoder)| *decoder)
        .ok_or_else(|| Error::Decode(format!("unsupported value tag: {tag}")))?;

    decoder(repr)
}

/// JSON form of a value, if JSON can represent it without loss of kind
fn canonical_json(value: &Value) -> Option<serde_json::Value> {
    use serde_json::Value as Json;

    match value {
        Value::Null => Some(Json::Null),
        Value::Array(items) | Value::List(items) => items
            .iter()
            .map(canonical_json)
            .collect::<Option<Vec<_>>>()
            .map(Json::Array),
        Value::Map(map) => map
            .iter()
            .map(|(key, item)| canonical_json(item).map(|json| (key.clone(), json)))
            .collect::<Option<serde_json::Map<_, _>>>()
            .map(Json::Object),
        other => scalar_json(other),
    }
}

/// JSON form of a scalar that survives a JSON round trip
fn scalar_json(value: &Value) -> Option<serde_json::Value> {
    use serde_json::Value as Json;

    match value {
        Value::Bool(b) => Some(Json::Bool(*b)),
        Value::Int(i) => Some(Json::from(*i)),
        Value::Float(f) => serde_json::Number::from_f64(*f).map(Json::Number),
        Value::String(s) => Some(Json::String(s.clone())),
        _ => None,
    }
}

fn unencodable(value: &Value) -> Error {
    Error::Encode(format!("no encoding for {} value", value.type_name()))
}

fn decode_char(repr: &str) -> Result<Value> {
    let mut chars = repr.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::Char(c)),
        _ => Err(Error::Decode(format!("invalid char payload: {repr:?}"))),
    }
}

fn decode_float(repr: &str) -> Result<Value> {
    repr.parse::<f64>()
        .map(Value::Float)
        .map_err(|e| Error::Decode(format!("invalid float payload {repr:?}: {e}")))
}

fn decode_set(repr: &str) -> Result<Value> {
    let members: Vec<serde_json::Value> = serde_json::from_str(repr)
        .map_err(|e| Error::Decode(format!("invalid set payload: {e}")))?;

    members
        .iter()
        .map(|member| match member {
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(Error::Decode(
                "set members must be scalars".to_string(),
            )),
            scalar => Ok(Value::from_json(scalar)),
        })
        .collect::<Result<BTreeSet<_>>>()
        .map(Value::Set)
}

#[allow(clippy::unnecessary_wraps)]
fn decode_xml(repr: &str) -> Result<Value> {
    Ok(Value::Xml(repr.to_string()))
}
