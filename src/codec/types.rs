//! Scalar type-name table
//!
//! Maps the type names found in EDEF `value-type` attributes onto the
//! scalar variants of [`Value`], and converts raw text accordingly.

use crate::value::Value;
use crate::{Error, Result};

const STRING_NAMES: &[&str] = &["String"];
const INT_NAMES: &[&str] = &[
    "int", "Integer", "long", "Long", "short", "Short", "byte", "Byte", "bytes", "Bytes",
];
const FLOAT_NAMES: &[&str] = &["float", "Float", "double", "Double"];
const BOOL_NAMES: &[&str] = &["boolean", "Boolean"];
const CHAR_NAMES: &[&str] = &["char", "Character"];

/// Scalar value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Int,
    Float,
    Bool,
    Char,
}

impl ValueType {
    /// Resolve a type name from its family
    ///
    /// # Errors
    ///
    /// Returns a schema error for an unknown type name
    pub fn from_name(name: &str) -> Result<Self> {
        let families: [(&[&str], Self); 5] = [
            (STRING_NAMES, Self::String),
            (INT_NAMES, Self::Int),
            (FLOAT_NAMES, Self::Float),
            (BOOL_NAMES, Self::Bool),
            (CHAR_NAMES, Self::Char),
        ];

        families
            .iter()
            .find(|(names, _)| names.contains(&name))
            .map(|(_, ty)| *ty)
            .ok_or_else(|| Error::Schema(format!("unknown value type: {name}")))
    }

    /// Canonical name written to documents
    #[must_use]
    pub const fn canonical_name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Int => "Long",
            Self::Float => "Double",
            Self::Bool => "Boolean",
            Self::Char => "Character",
        }
    }

    /// Scalar type of a value, if it is a scalar
    #[must_use]
    pub const fn of(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) => Some(Self::String),
            Value::Int(_) => Some(Self::Int),
            Value::Float(_) => Some(Self::Float),
            Value::Bool(_) => Some(Self::Bool),
            Value::Char(_) => Some(Self::Char),
            _ => None,
        }
    }

    /// Convert raw text into a value of this type
    ///
    /// The text is trimmed first. Booleans are true unless the lower-cased
    /// text is `false` or `0`; chars take the first code point.
    ///
    /// # Errors
    ///
    /// Returns a format error if the text is not a valid value of this type
    pub fn convert(self, raw: &str) -> Result<Value> {
        let raw = raw.trim();
        match self {
            Self::String => Ok(Value::String(raw.to_string())),
            Self::Int => raw
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| Error::Format(format!("invalid integer {raw:?}: {e}"))),
            Self::Float => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| Error::Format(format!("invalid float {raw:?}: {e}"))),
            Self::Bool => {
                let lower = raw.to_lowercase();
                Ok(Value::Bool(lower != "false" && lower != "0"))
            }
            Self::Char => raw
                .chars()
                .next()
                .map(Value::Char)
                .ok_or_else(|| Error::Format("empty character value".to_string())),
        }
    }

    /// Render a scalar value as text that [`ValueType::convert`] reads back
    #[must_use]
    pub fn render(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Char(c) => Some(c.to_string()),
            _ => None,
        }
    }
}
