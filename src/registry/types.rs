//! Registry entry types

use chrono::{DateTime, Utc};

use crate::endpoint::EndpointDescription;

/// An endpoint accepted into the registry
#[derive(Debug, Clone)]
pub struct ImportedEndpoint {
    pub endpoint: EndpointDescription,
    pub imported_at: DateTime<Utc>,
}
