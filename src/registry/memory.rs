//! In-memory import registry

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::EndpointRegistry;
use super::types::ImportedEndpoint;
use crate::endpoint::EndpointDescription;

/// Registry of imported endpoints kept in memory
#[derive(Debug, Default)]
pub struct ImportRegistry {
    endpoints: RwLock<HashMap<String, ImportedEndpoint>>,
}

impl ImportRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an imported endpoint by uid
    #[must_use]
    pub fn get(&self, uid: &str) -> Option<ImportedEndpoint> {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uid)
            .cloned()
    }

    /// List all imported endpoints
    #[must_use]
    pub fn list(&self) -> Vec<ImportedEndpoint> {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Number of imported endpoints
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EndpointRegistry for ImportRegistry {
    fn add(&self, endpoint: EndpointDescription) -> bool {
        let mut endpoints = self
            .endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if endpoints.contains_key(endpoint.id()) {
            tracing::debug!(uid = %endpoint.id(), "endpoint already registered");
            return false;
        }

        tracing::info!(
            uid = %endpoint.id(),
            interfaces = ?endpoint.interfaces(),
            config = endpoint.configuration(),
            "endpoint imported"
        );
        endpoints.insert(
            endpoint.id().to_string(),
            ImportedEndpoint {
                endpoint,
                imported_at: chrono::Utc::now(),
            },
        );
        true
    }

    fn remove(&self, uid: &str) {
        let removed = self
            .endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uid);

        if removed.is_some() {
            tracing::info!(uid, "endpoint removed");
        } else {
            tracing::debug!(uid, "unknown endpoint, nothing to remove");
        }
    }
}
