//! Reply normalization.
//!
//! Vendor replies arrive with a mix of default namespaces and prefixes.
//! [`RpcReply::parse`] strips every namespace so the extractors in this
//! module can address elements by local name only.

mod extract;

pub use extract::{
    to_capabilities, to_crypto_map, to_hostname, to_interfaces, to_subinterfaces, to_vlans,
    to_zones,
};

use log::{debug, warn};

use crate::error::{Error, ReplyError, Result, RpcError, RpcErrors};
use crate::xml::Element;

/// A parsed, namespace-free `<rpc-reply>`.
#[derive(Debug, Clone)]
pub struct RpcReply {
    root: Element,
    raw: String,
    warnings: Vec<RpcError>,
}

impl RpcReply {
    /// Parse a reply document.
    ///
    /// Bytes that are not valid UTF-8 are replaced. Any `<rpc-error>` with
    /// severity `error` turns the reply into [`Error::Protocol`]; warnings
    /// are kept on the reply.
    pub fn parse(bytes: impl AsRef<[u8]>) -> Result<Self> {
        let raw = String::from_utf8_lossy(bytes.as_ref()).into_owned();
        let root = Element::parse(&raw)
            .map_err(|e| ReplyError::Malformed(e.to_string()))?
            .stripped();

        if root.name() != "rpc-reply" {
            return Err(ReplyError::UnexpectedRoot(root.name().to_string()).into());
        }

        let (errors, warnings): (Vec<RpcError>, Vec<RpcError>) = root
            .find_all("rpc-error")
            .into_iter()
            .map(rpc_error)
            .partition(|e| e.severity != "warning");

        if !errors.is_empty() {
            debug!("Reply carries {} rpc-error(s)", errors.len());
            return Err(Error::Protocol(RpcErrors {
                errors,
                raw_reply: raw,
            }));
        }
        for warning in &warnings {
            warn!("rpc-error warning: {}", warning);
        }

        Ok(Self {
            root,
            raw,
            warnings,
        })
    }

    /// The stripped `<rpc-reply>` element.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// The `<data>` child of a `<get>` / `<get-config>` reply.
    pub fn data(&self) -> Option<&Element> {
        self.root.find("data")
    }

    /// Whether the reply is a bare `<ok/>`.
    pub fn is_ok(&self) -> bool {
        self.root.find("ok").is_some()
    }

    pub fn message_id(&self) -> Option<&str> {
        self.root.attribute("message-id")
    }

    /// Severity `warning` errors.
    pub fn warnings(&self) -> &[RpcError] {
        &self.warnings
    }

    /// The reply exactly as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn into_root(self) -> Element {
        self.root
    }
}

fn rpc_error(element: &Element) -> RpcError {
    let field = |name: &str| element.find_text(name).map(|t| t.trim().to_string());
    RpcError {
        error_type: field("error-type").unwrap_or_default(),
        tag: field("error-tag").unwrap_or_default(),
        severity: field("error-severity").unwrap_or_else(|| "error".to_string()),
        message: field("error-message"),
        path: field("error-path"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_ok_reply() {
        let reply = RpcReply::parse(
            r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="101"><ok/></rpc-reply>"#,
        )
        .unwrap();
        assert!(reply.is_ok());
        assert_eq!(reply.message_id(), Some("101"));
        assert!(reply.data().is_none());
    }

    #[test]
    fn test_namespaces_are_stripped() {
        let reply = RpcReply::parse(
            r#"<nc:rpc-reply xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0"><nc:data><native xmlns="http://cisco.com/ns/yang/Cisco-IOS-XE-native"><hostname>R1</hostname></native></nc:data></nc:rpc-reply>"#,
        )
        .unwrap();
        let data = reply.data().unwrap();
        assert_eq!(data.find_text("native/hostname"), Some("R1"));
        assert_eq!(data.find("native").unwrap().namespace(), None);
    }

    #[test]
    fn test_rpc_error_becomes_protocol_error() {
        let raw = r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">
            <rpc-error>
              <error-type>application</error-type>
              <error-tag>invalid-value</error-tag>
              <error-severity>error</error-severity>
              <error-message>bad vlan</error-message>
            </rpc-error>
        </rpc-reply>"#;
        let err = RpcReply::parse(raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        match err {
            Error::Protocol(errors) => {
                assert_eq!(errors.errors[0].tag, "invalid-value");
                assert_eq!(errors.errors[0].message.as_deref(), Some("bad vlan"));
                assert!(errors.raw_reply.contains("bad vlan"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_warnings_are_kept() {
        let reply = RpcReply::parse(
            "<rpc-reply><rpc-error><error-tag>x</error-tag><error-severity>warning</error-severity></rpc-error><ok/></rpc-reply>",
        )
        .unwrap();
        assert_eq!(reply.warnings().len(), 1);
        assert!(reply.is_ok());
    }

    #[test]
    fn test_malformed_and_unexpected() {
        assert_eq!(RpcReply::parse("<rpc-reply>").unwrap_err().kind(), ErrorKind::ReplyParse);
        assert_eq!(RpcReply::parse("<hello/>").unwrap_err().kind(), ErrorKind::ReplyParse);
    }

    #[test]
    fn test_lossy_utf8() {
        let mut bytes = b"<rpc-reply><data><d>".to_vec();
        bytes.push(0xff);
        bytes.extend_from_slice(b"</d></data></rpc-reply>");
        let reply = RpcReply::parse(&bytes).unwrap();
        assert_eq!(reply.data().unwrap().find_text("d"), Some("\u{fffd}"));
    }
}
