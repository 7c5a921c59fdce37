//! Property codecs
//!
//! - [`properties`]: typed values to transport-safe strings and back
//! - [`bridge`]: generic object graphs to foreign typed-collection form
//! - [`types`]: the scalar type-name table shared with the EDEF reader

pub mod bridge;
pub mod properties;
pub mod types;

pub use bridge::{Bridge, BeanDescriptor, BeanRegistry, BeanSchema};
pub use properties::{deserialize_properties, serialize_properties};
pub use types::ValueType;
