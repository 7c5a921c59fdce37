//! EDEF writer
//!
//! Produces documents the reader parses back into equal property maps.
//! Values the format cannot carry are refused instead of being written
//! lossily: nulls, maps, beans, nested or mixed-type collections, strings
//! with surrounding whitespace (values are trimmed on read) and markup that
//! is not exactly one element.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use roxmltree::Document;

use super::{
    ATTR_NAME, ATTR_VALUE, ATTR_VALUE_TYPE, NAMESPACE, TAG_ARRAY, TAG_ENDPOINT_DESCRIPTION,
    TAG_ENDPOINT_DESCRIPTIONS, TAG_LIST, TAG_PROPERTY, TAG_SET, TAG_VALUE, TAG_XML,
};
use crate::codec::ValueType;
use crate::endpoint::EndpointDescription;
use crate::value::Value;
use crate::{Error, Result};

/// Write endpoint descriptions as an EDEF document
///
/// # Errors
///
/// Returns a schema error if a property value cannot be represented
pub fn write(endpoints: &[EndpointDescription]) -> Result<String> {
    let properties: Vec<_> = endpoints.iter().map(EndpointDescription::properties).collect();
    write_properties(&properties)
}

/// Write raw property maps as an EDEF document, one endpoint per map
///
/// # Errors
///
/// Returns a schema error if a property value cannot be represented
pub fn write_properties(endpoints: &[&BTreeMap<String, Value>]) -> Result<String> {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(out, "<{TAG_ENDPOINT_DESCRIPTIONS} xmlns=\"{NAMESPACE}\">");

    for properties in endpoints {
        let _ = writeln!(out, "  <{TAG_ENDPOINT_DESCRIPTION}>");
        for (name, value) in *properties {
            write_property(&mut out, name, value)
                .map_err(|e| Error::Schema(format!("property {name}: {e}")))?;
        }
        let _ = writeln!(out, "  </{TAG_ENDPOINT_DESCRIPTION}>");
    }

    let _ = writeln!(out, "</{TAG_ENDPOINT_DESCRIPTIONS}>");
    Ok(out)
}

fn write_property(out: &mut String, name: &str, value: &Value) -> Result<()> {
    let name = escape(name);

    match value {
        Value::String(_) => {
            let text = scalar_text(value)?;
            let _ = writeln!(
                out,
                "    <{TAG_PROPERTY} {ATTR_NAME}=\"{name}\" {ATTR_VALUE}=\"{text}\"/>"
            );
        }
        Value::Int(_) | Value::Float(_) | Value::Bool(_) | Value::Char(_) => {
            let value_type = ValueType::of(value).map_or("String", ValueType::canonical_name);
            let text = scalar_text(value)?;
            let _ = writeln!(
                out,
                "    <{TAG_PROPERTY} {ATTR_NAME}=\"{name}\" {ATTR_VALUE_TYPE}=\"{value_type}\" {ATTR_VALUE}=\"{text}\"/>"
            );
        }
        Value::Array(_) | Value::List(_) | Value::Set(_) => {
            let tag = match value {
                Value::Array(_) => TAG_ARRAY,
                Value::List(_) => TAG_LIST,
                _ => TAG_SET,
            };
            let items = value.elements().unwrap_or_default();
            let value_type = collection_type(&items)?;

            let _ = writeln!(
                out,
                "    <{TAG_PROPERTY} {ATTR_NAME}=\"{name}\" {ATTR_VALUE_TYPE}=\"{}\">",
                value_type.canonical_name()
            );
            let _ = writeln!(out, "      <{tag}>");
            for item in items {
                let _ = writeln!(out, "        <{TAG_VALUE}>{}</{TAG_VALUE}>", scalar_text(item)?);
            }
            let _ = writeln!(out, "      </{tag}>");
            let _ = writeln!(out, "    </{TAG_PROPERTY}>");
        }
        Value::Xml(markup) => {
            check_markup(markup)?;
            let _ = writeln!(out, "    <{TAG_PROPERTY} {ATTR_NAME}=\"{name}\">");
            let _ = writeln!(out, "      <{TAG_XML}>{markup}</{TAG_XML}>");
            let _ = writeln!(out, "    </{TAG_PROPERTY}>");
        }
        Value::Null | Value::Map(_) | Value::Bean(_) => {
            return Err(Error::Schema(format!(
                "{} values are not representable",
                value.type_name()
            )));
        }
    }

    Ok(())
}

/// Shared scalar type of a collection; empty collections are strings
fn collection_type(items: &[&Value]) -> Result<ValueType> {
    let mut value_type = None;
    for item in items {
        let item_type = ValueType::of(item).ok_or_else(|| {
            Error::Schema(format!("{} values cannot be collection members", item.type_name()))
        })?;
        match value_type {
            None => value_type = Some(item_type),
            Some(existing) if existing != item_type => {
                return Err(Error::Schema("mixed-type collection".to_string()));
            }
            Some(_) => {}
        }
    }
    Ok(value_type.unwrap_or(ValueType::String))
}

/// Escaped text of a scalar that survives the reader's trimming
fn scalar_text(value: &Value) -> Result<String> {
    let text = ValueType::render(value)
        .ok_or_else(|| Error::Schema(format!("{} is not a scalar", value.type_name())))?;

    if text.trim() != text {
        return Err(Error::Schema(format!(
            "value {text:?} has surrounding whitespace"
        )));
    }

    Ok(escape(&text))
}

fn check_markup(markup: &str) -> Result<()> {
    let doc = Document::parse(markup)
        .map_err(|e| Error::Schema(format!("invalid xml value: {e}")))?;
    if doc.root_element().range() != (0..markup.len()) {
        return Err(Error::Schema(
            "xml value must be exactly one element".to_string(),
        ));
    }
    Ok(())
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' => escaped.push_str("&#9;"),
            c => escaped.push(c),
        }
    }
    escaped
}
