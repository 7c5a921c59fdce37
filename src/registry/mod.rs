//! Registry of imported endpoints
//!
//! Discovery hands every endpoint it learns about to an
//! [`EndpointRegistry`]; the registry decides whether to accept it

pub mod memory;
pub mod types;

pub use memory::ImportRegistry;
pub use types::ImportedEndpoint;

use crate::endpoint::EndpointDescription;

/// Holds imported endpoints keyed by uid
pub trait EndpointRegistry: Send + Sync {
    /// Add an endpoint, returning whether it was accepted
    ///
    /// An endpoint whose uid is already registered must be rejected
    fn add(&self, endpoint: EndpointDescription) -> bool;

    /// Remove the endpoint with the given uid; unknown uids are ignored
    fn remove(&self, uid: &str);
}
