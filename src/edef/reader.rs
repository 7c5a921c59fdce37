//! EDEF reader

use std::collections::{BTreeMap, BTreeSet};

use roxmltree::{Document, Node};

use super::{
    ATTR_NAME, ATTR_VALUE, ATTR_VALUE_TYPE, TAG_ARRAY, TAG_ENDPOINT_DESCRIPTION,
    TAG_ENDPOINT_DESCRIPTIONS, TAG_LIST, TAG_PROPERTY, TAG_SET, TAG_VALUE, TAG_XML,
};
use crate::codec::ValueType;
use crate::endpoint::EndpointDescription;
use crate::value::Value;
use crate::{Error, Result};

/// Parse an EDEF document into endpoint descriptions
///
/// # Errors
///
/// Returns a format error if the document is not well-formed XML, its root
/// is not `endpoint-descriptions` or a value does not match its type; a
/// schema error if an attribute or mandatory endpoint property is missing
/// or a value type is unknown
pub fn parse(document: &str) -> Result<Vec<EndpointDescription>> {
    parse_properties(document)?
        .into_iter()
        .map(EndpointDescription::from_properties)
        .collect()
}

/// Parse an EDEF document into one property map per endpoint
///
/// A property repeated within an endpoint keeps its last value.
///
/// # Errors
///
/// Same as [`parse`], minus the mandatory property checks
pub fn parse_properties(document: &str) -> Result<Vec<BTreeMap<String, Value>>> {
    let doc = Document::parse(document)?;
    let root = doc.root_element();

    if root.tag_name().name() != TAG_ENDPOINT_DESCRIPTIONS {
        return Err(Error::Format(format!(
            "not an EDEF document: root is <{}>",
            root.tag_name().name()
        )));
    }

    elements(root, TAG_ENDPOINT_DESCRIPTION)
        .map(|endpoint| parse_description(&doc, endpoint))
        .collect()
}

fn parse_description(doc: &Document<'_>, node: Node<'_, '_>) -> Result<BTreeMap<String, Value>> {
    let mut properties = BTreeMap::new();
    for property in elements(node, TAG_PROPERTY) {
        let (name, value) = parse_property(doc, property)?;
        properties.insert(name, value);
    }
    Ok(properties)
}

fn parse_property(doc: &Document<'_>, node: Node<'_, '_>) -> Result<(String, Value)> {
    let name = node
        .attribute(ATTR_NAME)
        .ok_or_else(|| Error::Schema(format!("<{TAG_PROPERTY}> without {ATTR_NAME}")))?;
    let value_type = ValueType::from_name(node.attribute(ATTR_VALUE_TYPE).unwrap_or("String"))?;

    let value = match node.children().find(Node::is_element) {
        Some(child) => parse_value_node(doc, value_type, child)?,
        None => {
            let raw = node.attribute(ATTR_VALUE).ok_or_else(|| {
                Error::Schema(format!("property {name} has neither a value nor a child"))
            })?;
            value_type.convert(raw)?
        }
    };

    Ok((name.to_string(), value))
}

fn parse_value_node(
    doc: &Document<'_>,
    value_type: ValueType,
    node: Node<'_, '_>,
) -> Result<Value> {
    match node.tag_name().name() {
        TAG_XML => {
            let markup = node.children().find(Node::is_element).ok_or_else(|| {
                Error::Schema(format!("<{TAG_XML}> without a child element"))
            })?;
            Ok(Value::Xml(doc.input_text()[markup.range()].to_string()))
        }
        TAG_ARRAY => Ok(Value::Array(collect_values(value_type, node)?)),
        TAG_LIST => Ok(Value::List(collect_values(value_type, node)?)),
        TAG_SET => Ok(Value::Set(
            collect_values(value_type, node)?
                .into_iter()
                .collect::<BTreeSet<_>>(),
        )),
        other => Err(Error::Schema(format!("unknown value tag: <{other}>"))),
    }
}

fn collect_values(value_type: ValueType, node: Node<'_, '_>) -> Result<Vec<Value>> {
    elements(node, TAG_VALUE)
        .map(|value| value_type.convert(value.text().unwrap_or_default()))
        .collect()
}

/// Child elements with the given local name
fn elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == tag)
}
