//! `<hello>` capability exchange.

use crate::error::SessionError;
use crate::xml::{Element, NETCONF_BASE_NS};

/// Base capability for NETCONF 1.0 (end-of-message framing).
pub const BASE_1_0: &str = "urn:ietf:params:netconf:base:1.0";

/// Base capability for NETCONF 1.1 (chunked framing).
pub const BASE_1_1: &str = "urn:ietf:params:netconf:base:1.1";

/// The parsed server `<hello>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    /// Session id assigned by the server.
    pub session_id: Option<u32>,
    /// Advertised capability URIs in server order.
    pub capabilities: Vec<String>,
}

impl ServerHello {
    /// Parse a server hello message.
    pub fn parse(message: &str) -> Result<Self, SessionError> {
        let root = Element::parse(message)
            .map_err(|e| SessionError::InvalidHello(e.to_string()))?
            .stripped();
        if root.name() != "hello" {
            return Err(SessionError::InvalidHello(format!(
                "expected <hello>, got <{}>",
                root.name()
            )));
        }

        let capabilities: Vec<String> = root
            .find_all("capabilities/capability")
            .into_iter()
            .filter_map(Element::text)
            .map(str::to_string)
            .collect();
        if capabilities.is_empty() {
            return Err(SessionError::InvalidHello(
                "server advertised no capabilities".to_string(),
            ));
        }

        let session_id = match root.find_text("session-id") {
            Some(id) => Some(id.parse().map_err(|_| {
                SessionError::InvalidHello(format!("invalid session-id '{}'", id))
            })?),
            None => None,
        };

        Ok(Self {
            session_id,
            capabilities,
        })
    }

    /// Whether the server speaks NETCONF 1.1 framing.
    pub fn supports_base_1_1(&self) -> bool {
        self.capabilities.iter().any(|c| c == BASE_1_1)
    }

    /// Render this hello as a server would send it.
    pub fn to_xml(&self) -> String {
        let mut root = Element::in_namespace(NETCONF_BASE_NS, "hello");
        let caps = root.push(Element::in_namespace(NETCONF_BASE_NS, "capabilities"));
        for capability in &self.capabilities {
            caps.push(Element::in_namespace(NETCONF_BASE_NS, "capability").with_text(capability));
        }
        if let Some(id) = self.session_id {
            root.push(Element::in_namespace(NETCONF_BASE_NS, "session-id").with_text(id.to_string()));
        }
        root.to_xml()
    }
}

/// The client `<hello>`, advertising both base versions.
pub fn client_hello() -> String {
    let mut root = Element::in_namespace(NETCONF_BASE_NS, "hello");
    let caps = root.push(Element::in_namespace(NETCONF_BASE_NS, "capabilities"));
    for capability in [BASE_1_0, BASE_1_1] {
        caps.push(Element::in_namespace(NETCONF_BASE_NS, "capability").with_text(capability));
    }
    root.to_xml()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_hello() {
        let hello = ServerHello::parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
              <capabilities>
                <capability>urn:ietf:params:netconf:base:1.0</capability>
                <capability>urn:ietf:params:netconf:base:1.1</capability>
                <capability>urn:ietf:params:netconf:capability:candidate:1.0</capability>
              </capabilities>
              <session-id>4711</session-id>
            </hello>"#,
        )
        .unwrap();
        assert_eq!(hello.session_id, Some(4711));
        assert_eq!(hello.capabilities.len(), 3);
        assert!(hello.supports_base_1_1());
    }

    #[test]
    fn test_parse_rejects_non_hello() {
        assert!(ServerHello::parse("<rpc-reply><ok/></rpc-reply>").is_err());
        assert!(ServerHello::parse("<hello><capabilities/></hello>").is_err());
        assert!(ServerHello::parse("<hello").is_err());
    }

    #[test]
    fn test_client_hello_advertises_both_bases() {
        let hello = client_hello();
        assert!(hello.contains(BASE_1_0));
        assert!(hello.contains(BASE_1_1));
        assert!(hello.starts_with("<hello xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\">"));
    }

    #[test]
    fn test_to_xml_parses_back() {
        let hello = ServerHello {
            session_id: Some(7),
            capabilities: vec![BASE_1_0.to_string()],
        };
        assert_eq!(ServerHello::parse(&hello.to_xml()).unwrap(), hello);
    }
}
