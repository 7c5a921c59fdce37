//! Endpoint descriptions
//!
//! An [`EndpointDescription`] is the import-side view of a remote service:
//! a uid, the framework that exported it, its configuration types and
//! interfaces, plus every other property it was described with. An
//! [`ExportEndpoint`] is a locally exported service about to be advertised.

use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};

use crate::codec::BeanSchema;
use crate::value::Value;
use crate::{Error, Result};

/// Unique id of the endpoint
pub const ENDPOINT_ID: &str = "endpoint-id";
/// Identity of the exporting framework
pub const FRAMEWORK_UUID: &str = "framework-uuid";
/// Configuration types the endpoint can be imported with
pub const IMPORTED_CONFIGS: &str = "imported-configs";
/// Interfaces exposed by the endpoint
pub const OBJECT_CLASS: &str = "object-class";
/// Dispatcher access port of the exporting framework
pub const ACCESS_PORT: &str = "access-port";
/// Dispatcher access path of the exporting framework
pub const ACCESS_PATH: &str = "access-path";
/// Export-side configuration types, never present on an import description
pub const EXPORTED_CONFIGS: &str = "exported-configs";
/// Export-side interfaces, never present on an import description
pub const EXPORTED_INTERFACES: &str = "exported-interfaces";
/// Service id on the exporting side
pub const SERVICE_ID: &str = "service-id";
/// Intents implemented by the endpoint
pub const INTENTS: &str = "intents";
/// Prefix of per-package version properties
pub const PACKAGE_VERSION_PREFIX: &str = "package-version.";

/// Import-side description of a remote endpoint
///
/// Immutable once built. Two descriptions are equal when their uids are.
#[derive(Debug, Clone)]
pub struct EndpointDescription {
    uid: String,
    framework_uuid: Option<String>,
    configuration_types: Vec<String>,
    interfaces: BTreeSet<String>,
    properties: BTreeMap<String, Value>,
}

impl EndpointDescription {
    /// Build a description from its properties
    ///
    /// # Errors
    ///
    /// Returns a schema error naming the key if a mandatory property is
    /// missing or malformed, or if an export-side property is present
    pub fn from_properties(properties: BTreeMap<String, Value>) -> Result<Self> {
        for key in [EXPORTED_CONFIGS, EXPORTED_INTERFACES] {
            if properties.contains_key(key) {
                return Err(Error::Schema(format!("export property found: {key}")));
            }
        }

        let uid = match require(&properties, ENDPOINT_ID)? {
            Value::String(uid) if !uid.is_empty() => uid.clone(),
            _ => return Err(Error::Schema(format!("invalid property: {ENDPOINT_ID}"))),
        };

        let mut configuration_types = Vec::new();
        for config in string_list(require(&properties, IMPORTED_CONFIGS)?, IMPORTED_CONFIGS)? {
            if !configuration_types.contains(&config) {
                configuration_types.push(config);
            }
        }
        if configuration_types.is_empty() {
            return Err(Error::Schema(format!("empty property: {IMPORTED_CONFIGS}")));
        }

        let interfaces: BTreeSet<String> =
            string_list(require(&properties, OBJECT_CLASS)?, OBJECT_CLASS)?
                .into_iter()
                .collect();

        let framework_uuid = properties
            .get(FRAMEWORK_UUID)
            .and_then(Value::as_str)
            .map(ToString::to_string);

        Ok(Self {
            uid,
            framework_uuid,
            configuration_types,
            interfaces,
            properties,
        })
    }

    /// Endpoint uid
    #[must_use]
    pub fn id(&self) -> &str {
        &self.uid
    }

    /// Uuid of the exporting framework, if known
    #[must_use]
    pub fn framework_uuid(&self) -> Option<&str> {
        self.framework_uuid.as_deref()
    }

    /// Configuration types, in declaration order without duplicates
    #[must_use]
    pub fn configuration_types(&self) -> &[String] {
        &self.configuration_types
    }

    /// The preferred configuration type
    #[must_use]
    pub fn configuration(&self) -> &str {
        &self.configuration_types[0]
    }

    #[must_use]
    pub const fn interfaces(&self) -> &BTreeSet<String> {
        &self.interfaces
    }

    /// Intents implemented by the endpoint
    #[must_use]
    pub fn intents(&self) -> Vec<String> {
        self.properties
            .get(INTENTS)
            .and_then(|value| string_list(value, INTENTS).ok())
            .unwrap_or_default()
    }

    /// Service id on the exporting side, or 0
    #[must_use]
    pub fn service_id(&self) -> i64 {
        self.properties
            .get(SERVICE_ID)
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// Version of the given package as its dotted components, `0.0.0` if absent
    #[must_use]
    pub fn package_version(&self, package: &str) -> Vec<String> {
        self.properties
            .get(&format!("{PACKAGE_VERSION_PREFIX}{package}"))
            .and_then(Value::as_str)
            .map_or_else(
                || vec!["0".to_string(); 3],
                |version| version.split('.').map(ToString::to_string).collect(),
            )
    }

    /// Whether both descriptions come from the same framework and service
    #[must_use]
    pub fn is_same_service(&self, other: &Self) -> bool {
        self.framework_uuid == other.framework_uuid && self.service_id() == other.service_id()
    }

    /// All properties the endpoint was described with
    #[must_use]
    pub const fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }
}

impl PartialEq for EndpointDescription {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for EndpointDescription {}

impl Hash for EndpointDescription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid.hash(state);
    }
}

impl std::fmt::Display for EndpointDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EndpointDescription(id={}; service.id={}; framework.uuid={})",
            self.uid,
            self.service_id(),
            self.framework_uuid.as_deref().unwrap_or("-")
        )
    }
}

/// Bean schema exposing descriptions to foreign peers
#[must_use]
pub fn description_schema() -> BeanSchema<EndpointDescription> {
    BeanSchema::<EndpointDescription>::new(
        "org.osgi.service.remoteserviceadmin.EndpointDescription",
        "beacon_discovery.EndpointDescription",
    )
    .field("id", |d| Value::from(d.id()))
    .field("frameworkUUID", |d| {
        d.framework_uuid().map_or(Value::Null, Value::from)
    })
    .field("configurationTypes", |d| {
        Value::List(d.configuration_types().iter().map(|c| Value::from(c.as_str())).collect())
    })
    .field("interfaces", |d| {
        Value::List(d.interfaces().iter().map(|i| Value::from(i.as_str())).collect())
    })
    .field("properties", |d| Value::Map(d.properties().clone()))
}

/// A locally exported service
#[derive(Debug, Clone, PartialEq)]
pub struct ExportEndpoint {
    pub uid: String,
    pub name: String,
    pub interfaces: Vec<String>,
    pub configurations: Vec<String>,
    pub properties: BTreeMap<String, Value>,
}

impl ExportEndpoint {
    /// Import-side description of this export, as peers will see it
    ///
    /// # Errors
    ///
    /// Returns a schema error if the export has no uid, interfaces or
    /// configurations
    pub fn to_description(
        &self,
        framework_uuid: &str,
        access: &(u16, String),
    ) -> Result<EndpointDescription> {
        let mut properties = self.properties.clone();
        properties.remove(EXPORTED_CONFIGS);
        properties.remove(EXPORTED_INTERFACES);

        properties.insert(ENDPOINT_ID.to_string(), Value::from(self.uid.as_str()));
        properties.insert(FRAMEWORK_UUID.to_string(), Value::from(framework_uuid));
        properties.insert(IMPORTED_CONFIGS.to_string(), strings(&self.configurations));
        properties.insert(OBJECT_CLASS.to_string(), strings(&self.interfaces));
        properties.insert(ACCESS_PORT.to_string(), Value::from(access.0));
        properties.insert(ACCESS_PATH.to_string(), Value::from(access.1.as_str()));

        EndpointDescription::from_properties(properties)
    }

    /// Export view of an already described endpoint
    #[must_use]
    pub fn from_description(description: &EndpointDescription) -> Self {
        Self {
            uid: description.id().to_string(),
            name: description.id().to_string(),
            interfaces: description.interfaces().iter().cloned().collect(),
            configurations: description.configuration_types().to_vec(),
            properties: description.properties().clone(),
        }
    }
}

fn require<'a>(properties: &'a BTreeMap<String, Value>, key: &str) -> Result<&'a Value> {
    properties
        .get(key)
        .ok_or_else(|| Error::Schema(format!("missing property: {key}")))
}

/// A string, or a collection of strings
fn string_list(value: &Value, key: &str) -> Result<Vec<String>> {
    let invalid = || Error::Schema(format!("invalid property: {key}"));

    if let Value::String(s) = value {
        return Ok(vec![s.clone()]);
    }

    value
        .elements()
        .ok_or_else(invalid)?
        .into_iter()
        .map(|item| item.as_str().map(ToString::to_string).ok_or_else(invalid))
        .collect()
}

fn strings(items: &[String]) -> Value {
    Value::List(items.iter().map(|item| Value::from(item.as_str())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_properties() -> BTreeMap<String, Value> {
        BTreeMap::from([
            (ENDPOINT_ID.to_string(), Value::from("E1")),
            (FRAMEWORK_UUID.to_string(), Value::from("F1")),
            (IMPORTED_CONFIGS.to_string(), Value::from("jsonrpc")),
            (
                OBJECT_CLASS.to_string(),
                Value::List(vec![Value::from("svc.Foo"), Value::from("svc.Foo")]),
            ),
        ])
    }

    #[test]
    fn builds_from_properties() {
        let endpoint = EndpointDescription::from_properties(base_properties()).unwrap();
        assert_eq!(endpoint.id(), "E1");
        assert_eq!(endpoint.framework_uuid(), Some("F1"));
        assert_eq!(endpoint.configuration(), "jsonrpc");
        assert_eq!(endpoint.interfaces().len(), 1);
        assert_eq!(endpoint.service_id(), 0);
        assert_eq!(endpoint.package_version("svc"), vec!["0", "0", "0"]);
    }

    #[test]
    fn missing_property_is_named() {
        let mut props = base_properties();
        props.remove(OBJECT_CLASS);

        let err = EndpointDescription::from_properties(props).unwrap_err();
        assert!(err.to_string().contains(OBJECT_CLASS));
    }

    #[test]
    fn export_properties_are_rejected() {
        let mut props = base_properties();
        props.insert(EXPORTED_CONFIGS.to_string(), Value::from("jsonrpc"));
        assert!(matches!(
            EndpointDescription::from_properties(props),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn equality_is_by_uid() {
        let a = EndpointDescription::from_properties(base_properties()).unwrap();
        let mut props = base_properties();
        props.insert(SERVICE_ID.to_string(), Value::Int(12));
        let b = EndpointDescription::from_properties(props).unwrap();

        assert_eq!(a, b);
        assert!(!a.is_same_service(&b));
    }

    #[test]
    fn export_converts_to_import_view() {
        let export = ExportEndpoint {
            uid: "E1".to_string(),
            name: "foo".to_string(),
            interfaces: vec!["svc.Foo".to_string()],
            configurations: vec!["jsonrpc".to_string()],
            properties: BTreeMap::from([
                (EXPORTED_CONFIGS.to_string(), Value::from("jsonrpc")),
                (SERVICE_ID.to_string(), Value::Int(7)),
            ]),
        };

        let description = export
            .to_description("F1", &(8080, "/dispatcher".to_string()))
            .unwrap();
        assert_eq!(description.framework_uuid(), Some("F1"));
        assert_eq!(description.service_id(), 7);
        assert_eq!(description.properties()[ACCESS_PORT], Value::Int(8080));
        assert!(!description.properties().contains_key(EXPORTED_CONFIGS));
    }

    #[test]
    fn package_version_components() {
        let mut props = base_properties();
        props.insert(
            format!("{PACKAGE_VERSION_PREFIX}svc"),
            Value::from("1.2.3"),
        );
        let endpoint = EndpointDescription::from_properties(props).unwrap();
        assert_eq!(endpoint.package_version("svc"), vec!["1", "2", "3"]);
    }
}
