//! Dispatcher access point
//!
//! Each framework exposes one dispatcher that remote calls go through.
//! Discovery publishes ours and reports the ones peers publish.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Access to the local dispatcher and the peers' ones
pub trait DispatcherAccess: Send + Sync {
    /// Port and path of the local dispatcher
    fn access(&self) -> (u16, String);

    /// A peer dispatcher was discovered
    fn send_discovered(&self, address: &str, port: u16, path: &str);
}

/// A discovered peer dispatcher
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerAccess {
    pub address: String,
    pub port: u16,
    pub path: String,
}

impl fmt::Display for PeerAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "http://[{}]:{}{}", self.address, self.port, self.path)
        } else {
            write!(f, "http://{}:{}{}", self.address, self.port, self.path)
        }
    }
}

/// Dispatcher access with a fixed local port and path
#[derive(Debug)]
pub struct StaticDispatcherAccess {
    port: u16,
    path: String,
    peers: RwLock<BTreeSet<PeerAccess>>,
}

impl StaticDispatcherAccess {
    #[must_use]
    pub fn new(port: u16, path: impl Into<String>) -> Self {
        Self {
            port,
            path: path.into(),
            peers: RwLock::new(BTreeSet::new()),
        }
    }

    /// Peer dispatchers discovered so far
    #[must_use]
    pub fn peers(&self) -> Vec<PeerAccess> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl DispatcherAccess for StaticDispatcherAccess {
    fn access(&self) -> (u16, String) {
        (self.port, self.path.clone())
    }

    fn send_discovered(&self, address: &str, port: u16, path: &str) {
        let peer = PeerAccess {
            address: address.to_string(),
            port,
            path: path.to_string(),
        };

        let added = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer.clone());
        if added {
            tracing::info!(peer = %peer, "peer dispatcher discovered");
        }
    }
}
