//! Foreign typed-collection bridge
//!
//! Peers running a Jabsorb-style JSON-RPC stack expect containers wrapped
//! in objects that name their Java class:
//!
//! ```text
//! {"javaClass": "java.util.HashMap",   "map":  {...}}
//! {"javaClass": "java.util.ArrayList", "list": [...]}
//! {"javaClass": "java.util.HashSet",   "set":  [...]}
//! ```
//!
//! Tuples ([`Value::Array`]) travel as bare arrays. Beans are objects of
//! their public fields tagged with both `javaClass` and a `__jsonclass__`
//! reconstruction hint. Which beans exist is declared up front through
//! [`BeanSchema`] and [`BeanRegistry`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value as Json};

use crate::value::{Bean, Value};

/// Key naming the foreign class of an object
pub const JAVA_CLASS: &str = "javaClass";

/// Key carrying the local reconstruction hint
pub const JSON_CLASS: &str = "__jsonclass__";

const MAP_CLASS: &str = "java.util.HashMap";
const LIST_CLASS: &str = "java.util.ArrayList";
const SET_CLASS: &str = "java.util.HashSet";

static MAPS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^java\.util\.(.*Map|Properties)").expect("valid map class pattern")
});
static LISTS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^java\.util\..*List").expect("valid list class pattern"));
static SETS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^java\.util\..*Set").expect("valid set class pattern"));

/// Accessor reading one field of a bean type
pub type FieldAccessor<T> = fn(&T) -> Value;

/// Static description of how a Rust type maps onto a foreign bean
pub struct BeanSchema<T> {
    java_class: &'static str,
    local_class: &'static str,
    fields: Vec<(&'static str, FieldAccessor<T>)>,
}

impl<T> BeanSchema<T> {
    /// Start a schema for the given foreign and local class names
    #[must_use]
    pub const fn new(java_class: &'static str, local_class: &'static str) -> Self {
        Self {
            java_class,
            local_class,
            fields: Vec::new(),
        }
    }

    /// Append a field; names starting with `_` are private and never sent
    #[must_use]
    pub fn field(mut self, name: &'static str, accessor: FieldAccessor<T>) -> Self {
        self.fields.push((name, accessor));
        self
    }

    /// Read the public fields of `value` into a bean
    #[must_use]
    pub fn to_bean(&self, value: &T) -> Bean {
        Bean {
            java_class: self.java_class.to_string(),
            local_class: self.local_class.to_string(),
            fields: self
                .fields
                .iter()
                .filter(|(name, _)| is_public(name))
                .map(|(name, accessor)| ((*name).to_string(), accessor(value)))
                .collect(),
        }
    }

    /// Decoding descriptor for registration in a [`BeanRegistry`]
    #[must_use]
    pub fn descriptor(&self) -> BeanDescriptor {
        BeanDescriptor {
            java_class: self.java_class.to_string(),
            local_class: self.local_class.to_string(),
            fields: self
                .fields
                .iter()
                .filter(|(name, _)| is_public(name))
                .map(|(name, _)| (*name).to_string())
                .collect(),
        }
    }
}

/// Field layout of a registered bean class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeanDescriptor {
    pub java_class: String,
    pub local_class: String,
    pub fields: Vec<String>,
}

/// Bean classes known to the decoder, keyed by foreign class
#[derive(Debug, Default, Clone)]
pub struct BeanRegistry {
    beans: HashMap<String, BeanDescriptor>,
}

impl BeanRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bean class, replacing any previous one with the same name
    pub fn register(&mut self, descriptor: BeanDescriptor) {
        self.beans.insert(descriptor.java_class.clone(), descriptor);
    }

    #[must_use]
    pub fn get(&self, java_class: &str) -> Option<&BeanDescriptor> {
        self.beans.get(java_class)
    }
}

/// Converts between local values and the foreign wire form
#[derive(Debug, Default, Clone)]
pub struct Bridge {
    beans: BeanRegistry,
}

impl Bridge {
    #[must_use]
    pub fn new(beans: BeanRegistry) -> Self {
        Self { beans }
    }

    /// Encode a value into the foreign wire form
    #[must_use]
    pub fn encode(&self, value: &Value) -> Json {
        match value {
            Value::Null => Json::Null,
            Value::Map(map) if map.contains_key(JAVA_CLASS) || map.contains_key(JSON_CLASS) => {
                // Already a bean representation: keep its markers as they are
                let mut object: Map<String, Json> = map
                    .iter()
                    .map(|(key, item)| (key.clone(), self.encode(item)))
                    .collect();
                if let Some(hint) = map.get(JSON_CLASS) {
                    object.insert(JSON_CLASS.to_string(), hint.to_json());
                }
                Json::Object(object)
            }
            Value::Map(map) => {
                let pairs: Map<String, Json> = map
                    .iter()
                    .map(|(key, item)| (key.clone(), self.encode(item)))
                    .collect();
                wrap(MAP_CLASS, "map", Json::Object(pairs))
            }
            Value::List(items) => wrap(LIST_CLASS, "list", self.encode_all(items.iter())),
            Value::Set(items) => wrap(SET_CLASS, "set", self.encode_all(items.iter())),
            Value::Array(items) => self.encode_all(items.iter()),
            Value::Bean(bean) => {
                let mut object: Map<String, Json> = bean
                    .fields
                    .iter()
                    .filter(|(name, _)| is_public(name))
                    .map(|(name, item)| (name.clone(), self.encode(item)))
                    .collect();
                object.insert(JAVA_CLASS.to_string(), Json::from(bean.java_class.clone()));
                object.insert(
                    JSON_CLASS.to_string(),
                    Json::Array(vec![Json::from(bean.local_class.clone()), Json::Array(vec![])]),
                );
                Json::Object(object)
            }
            scalar => scalar.to_json(),
        }
    }

    /// Decode a foreign wire value
    ///
    /// Unknown class markers fall back to structural decoding; a known
    /// container missing its payload is logged and decoded structurally.
    #[must_use]
    pub fn decode(&self, wire: &Json) -> Value {
        match wire {
            Json::Array(items) => {
                Value::Array(items.iter().map(|item| self.decode(item)).collect())
            }
            Json::Object(object) => self.decode_object(object),
            scalar => Value::from_json(scalar),
        }
    }

    fn decode_object(&self, object: &Map<String, Json>) -> Value {
        let Some(java_class) = object.get(JAVA_CLASS).and_then(Json::as_str) else {
            return self.decode_structural(object);
        };

        let decoded = if MAPS_PATTERN.is_match(java_class) {
            object
                .get("map")
                .and_then(Json::as_object)
                .map(|pairs| Value::Map(self.decode_pairs(pairs)))
        } else if LISTS_PATTERN.is_match(java_class) {
            object
                .get("list")
                .and_then(Json::as_array)
                .map(|items| Value::List(items.iter().map(|item| self.decode(item)).collect()))
        } else if SETS_PATTERN.is_match(java_class) {
            object.get("set").and_then(Json::as_array).map(|items| {
                Value::Set(
                    items
                        .iter()
                        .map(|item| self.decode(item))
                        .collect::<BTreeSet<_>>(),
                )
            })
        } else if let Some(descriptor) = self.beans.get(java_class) {
            self.decode_bean(descriptor, object)
        } else {
            return self.decode_structural(object);
        };

        decoded.unwrap_or_else(|| {
            tracing::warn!(java_class, "malformed foreign object, decoding structurally");
            self.decode_structural(object)
        })
    }

    fn decode_bean(
        &self,
        descriptor: &BeanDescriptor,
        object: &Map<String, Json>,
    ) -> Option<Value> {
        let fields = descriptor
            .fields
            .iter()
            .map(|name| object.get(name).map(|item| (name.clone(), self.decode(item))))
            .collect::<Option<Vec<_>>>()?;

        Some(Value::Bean(Bean {
            java_class: descriptor.java_class.clone(),
            local_class: descriptor.local_class.clone(),
            fields,
        }))
    }

    fn decode_structural(&self, object: &Map<String, Json>) -> Value {
        Value::Map(self.decode_pairs(object))
    }

    fn decode_pairs(&self, pairs: &Map<String, Json>) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(key, item)| (key.clone(), self.decode(item)))
            .collect()
    }

    fn encode_all<'a>(&self, items: impl Iterator<Item = &'a Value>) -> Json {
        Json::Array(items.map(|item| self.encode(item)).collect())
    }
}

fn wrap(java_class: &str, field: &str, payload: Json) -> Json {
    let mut object = Map::new();
    object.insert(JAVA_CLASS.to_string(), Json::from(java_class));
    object.insert(field.to_string(), payload);
    Json::Object(object)
}

fn is_public(name: &str) -> bool {
    !name.starts_with('_')
}
