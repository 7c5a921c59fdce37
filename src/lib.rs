//! Beacon Discovery - remote endpoint discovery over multicast DNS
//!
//! This library provides:
//! - Advertisement of exported endpoints and the dispatcher access point
//! - Browsing for peers and reconciling their endpoints into a registry
//! - A property codec that carries typed values through TXT records
//! - A bridging codec for foreign typed-collection object graphs
//! - EDEF (XML endpoint description) reading and writing
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Discovery Service                    │
//! │   export  │  discover  │  loop-back  │  removal      │
//! └──────┬─────────────┬──────────────────┬─────────────┘
//!        │             │                  │
//! ┌──────▼──────┐ ┌────▼──────────┐ ┌─────▼──────────────┐
//! │ RecordChannel│ │ Property Codec│ │ Endpoint Registry  │
//! │   (mDNS)     │ │  + Bridge     │ │  + EDEF folder     │
//! └──────────────┘ └───────────────┘ └────────────────────┘
//! ```

pub mod codec;
pub mod config;
pub mod discovery;
pub mod edef;
pub mod endpoint;
pub mod error;
pub mod registry;
pub mod value;

pub use config::Config;
pub use discovery::{
    DiscoveryService, DispatcherAccess, EdefDirectory, MdnsChannel, RecordChannel,
    RecordListener, RecordType, StaticDispatcherAccess,
};
pub use endpoint::{EndpointDescription, ExportEndpoint};
pub use error::{Error, Result};
pub use registry::{EndpointRegistry, ImportRegistry};
pub use value::{Bean, Value};
