//! Advertised records

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use uuid::Uuid;

/// Kind of advertised record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// Dispatcher access point of a framework
    Dispatcher,
    /// An exported endpoint
    Endpoint,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispatcher => write!(f, "dispatcher"),
            Self::Endpoint => write!(f, "endpoint"),
        }
    }
}

/// A record advertised by this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub record_type: RecordType,
    /// Service type, e.g. `_rs-endpoint._tcp.local.`
    pub service_type: String,
    /// Instance label, unique within the service type
    pub instance: String,
    /// Advertised address; `None` lets the channel pick the host addresses
    pub address: Option<IpAddr>,
    pub port: u16,
    /// Properties in transport form
    pub properties: BTreeMap<String, String>,
    /// Time-to-live of the advertisement, in seconds
    pub ttl: u32,
}

impl ServiceRecord {
    /// Fully qualified record name, `<instance>.<service type>`
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}.{}", self.instance, self.service_type)
    }
}

/// Instance label of a framework's dispatcher record
#[must_use]
pub fn dispatcher_instance(framework_uuid: &str) -> String {
    framework_uuid.to_string()
}

/// Instance label of an exported endpoint
///
/// Derived from the endpoint uid and the exporting framework so that
/// republishing the same endpoint reuses the same name; hashed so the label
/// fits in a DNS label whatever the uid length.
#[must_use]
pub fn endpoint_instance(uid: &str, framework_uuid: &str) -> String {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{framework_uuid}/{uid}").as_bytes(),
    )
    .to_string()
}

/// A peer record as resolved from the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecord {
    /// Fully qualified record name
    pub name: String,
    pub address: Option<String>,
    pub port: u16,
    /// Properties in transport form
    pub properties: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_instance_is_deterministic() {
        let first = endpoint_instance("E1", "F1");
        assert_eq!(first, endpoint_instance("E1", "F1"));
        assert_ne!(first, endpoint_instance("E1", "F2"));
        assert_ne!(first, endpoint_instance("E2", "F1"));
        assert!(first.len() <= 63);
    }

    #[test]
    fn record_name_joins_instance_and_type() {
        let record = ServiceRecord {
            record_type: RecordType::Dispatcher,
            service_type: "_rs-dispatcher._tcp.local.".to_string(),
            instance: dispatcher_instance("F1"),
            address: None,
            port: 8080,
            properties: BTreeMap::new(),
            ttl: 60,
        };
        assert_eq!(record.name(), "F1._rs-dispatcher._tcp.local.");
    }
}
