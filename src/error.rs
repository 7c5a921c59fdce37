//! Error types for beacon discovery

use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while discovering, decoding or parsing endpoints
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed document or value
    #[error("format error: {0}")]
    Format(String),

    /// Missing or unknown attribute, property or type
    #[error("schema error: {0}")]
    Schema(String),

    /// Record resolution gave up after its retry budget
    #[error("timed out resolving {name} after {attempts} attempts")]
    Timeout {
        /// Advertised record name
        name: String,
        /// Number of resolution attempts made
        attempts: u32,
    },

    /// The registry declined an endpoint
    #[error("registration rejected: {0}")]
    RegistrationRejected(String),

    /// A property value could not be decoded by any known strategy
    #[error("decode error: {0}")]
    Decode(String),

    /// A property value could not be encoded by any known strategy
    #[error("encode error: {0}")]
    Encode(String),

    /// mDNS daemon error
    #[error("mdns error: {0}")]
    Mdns(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Self::Format(e.to_string())
    }
}

impl From<mdns_sd::Error> for Error {
    fn from(e: mdns_sd::Error) -> Self {
        Self::Mdns(e.to_string())
    }
}
