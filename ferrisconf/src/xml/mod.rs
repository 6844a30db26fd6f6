//! Owned XML element tree used for templates, payloads and replies.
//!
//! Parsing is built on `quick-xml` events. Elements keep their prefix,
//! resolved namespace URI and namespace declarations, so a template can be
//! specialized and written back out without losing vendor namespaces.

mod element;
mod path;

pub use element::{Element, XmlError};
pub use path::Namespaces;

/// NETCONF base namespace (RFC 6241).
pub const NETCONF_BASE_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";
