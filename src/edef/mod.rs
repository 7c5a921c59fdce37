//! Endpoint Description Extender Format (EDEF)
//!
//! XML documents describing endpoints as typed property lists:
//!
//! ```xml
//! <endpoint-descriptions xmlns="http://www.osgi.org/xmlns/rsa/v1.0.0">
//!   <endpoint-description>
//!     <property name="endpoint-id" value="E1"/>
//!     <property name="count" value-type="int" value="42"/>
//!     <property name="tags" value-type="String">
//!       <set><value>a</value><value>b</value></set>
//!     </property>
//!   </endpoint-description>
//! </endpoint-descriptions>
//! ```

pub mod reader;
pub mod writer;

pub use reader::{parse, parse_properties};
pub use writer::write;

pub(crate) const NAMESPACE: &str = "http://www.osgi.org/xmlns/rsa/v1.0.0";

pub(crate) const TAG_ENDPOINT_DESCRIPTIONS: &str = "endpoint-descriptions";
pub(crate) const TAG_ENDPOINT_DESCRIPTION: &str = "endpoint-description";
pub(crate) const TAG_PROPERTY: &str = "property";
pub(crate) const TAG_ARRAY: &str = "array";
pub(crate) const TAG_LIST: &str = "list";
pub(crate) const TAG_SET: &str = "set";
pub(crate) const TAG_XML: &str = "xml";
pub(crate) const TAG_VALUE: &str = "value";

pub(crate) const ATTR_NAME: &str = "name";
pub(crate) const ATTR_VALUE_TYPE: &str = "value-type";
pub(crate) const ATTR_VALUE: &str = "value";
