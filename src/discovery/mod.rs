//! Endpoint discovery over multicast DNS
//!
//! Advertises the local dispatcher access point and every exported
//! endpoint, browses for the same record types published by peers, and
//! reconciles what it finds into an [`EndpointRegistry`].
//!
//! Service types (configurable):
//! - dispatcher: `_rs-dispatcher._tcp.local.`
//! - endpoint: `_rs-endpoint._tcp.local.`
//!
//! TXT records carry the endpoint properties in the transport form
//! produced by [`crate::codec::properties`].
//!
//! [`EndpointRegistry`]: crate::registry::EndpointRegistry

pub mod channel;
pub mod dispatcher;
pub mod file;
pub mod mdns;
pub mod record;
pub mod service;

pub use channel::{BrowseHandle, RecordChannel, RecordListener};
pub use dispatcher::{DispatcherAccess, PeerAccess, StaticDispatcherAccess};
pub use file::{EdefDirectory, ScanReport};
pub use mdns::MdnsChannel;
pub use record::{RecordType, ResolvedRecord, ServiceRecord};
pub use service::DiscoveryService;
