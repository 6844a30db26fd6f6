//! Payload builders.
//!
//! A builder binds to one model family and feature. It loads the matching
//! template, specializes a private copy from a typed record and returns one
//! of three payload shapes:
//!
//! - [`GetFilter`] - subtree filter for `<get>` / `<get-config>`
//! - [`EditConfigFilter`] - content of `<edit-config><config>`
//! - [`DispatchPayload`] - a complete RPC element
//!
//! Input is validated before any template is touched, so a builder error
//! never leaves a partial payload behind.

mod interfaces;
mod ipsec;
mod ospf;
mod rpc;
mod system;
mod vlan;

pub use interfaces::{OpenConfigAddress, OpenConfigInterfaces, OpenConfigSwitchedVlan};
pub use ipsec::{JunosIpsec, NativeIpsec};
pub use ospf::{NativeOspf, OpenConfigOspf, nominal_speed_bps, ospf_cost};
pub use rpc::{JunosRollback, JunosZones};
pub use system::{NativeHostname, OpenConfigHostname, validate_hostname};
pub use vlan::{JunosVlan, NativeVlan};

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result, TemplateError};
use crate::template::{Action, TemplateKey, TemplateStore};
use crate::xml::{Element, NETCONF_BASE_NS, Namespaces};

/// Namespace URIs used by the bundled templates.
pub mod ns {
    pub const IOS_NATIVE: &str = "http://cisco.com/ns/yang/Cisco-IOS-XE-native";
    pub const IOS_ACL: &str = "http://cisco.com/ns/yang/Cisco-IOS-XE-acl";
    pub const IOS_CRYPTO: &str = "http://cisco.com/ns/yang/Cisco-IOS-XE-crypto";
    pub const IOS_OSPF: &str = "http://cisco.com/ns/yang/Cisco-IOS-XE-ospf";
    pub const IOS_VLAN: &str = "http://cisco.com/ns/yang/Cisco-IOS-XE-vlan";

    pub const OC_SYSTEM: &str = "http://openconfig.net/yang/system";
    pub const OC_INTERFACES: &str = "http://openconfig.net/yang/interfaces";
    pub const OC_IP: &str = "http://openconfig.net/yang/interfaces/ip";
    pub const OC_ETHERNET: &str = "http://openconfig.net/yang/interfaces/ethernet";
    pub const OC_VLAN: &str = "http://openconfig.net/yang/vlan";
    pub const OC_NETWORK_INSTANCE: &str = "http://openconfig.net/yang/network-instance";

    pub const JUNOS_ROOT: &str = "http://yang.juniper.net/junos/conf/root";
    pub const JUNOS_VLANS: &str = "http://yang.juniper.net/junos/conf/vlans";
    pub const JUNOS_SECURITY: &str = "http://yang.juniper.net/junos/conf/security";
    pub const JUNOS_INTERFACES: &str = "http://yang.juniper.net/junos/conf/interfaces";
    pub const JUNOS_ROUTING_OPTIONS: &str = "http://yang.juniper.net/junos/conf/routing-options";
}

/// Prefix map for builder paths.
pub(crate) const NS: Namespaces = Namespaces(&[
    ("ios", ns::IOS_NATIVE),
    ("acl", ns::IOS_ACL),
    ("crypto", ns::IOS_CRYPTO),
    ("ospf", ns::IOS_OSPF),
    ("vlan", ns::IOS_VLAN),
    ("oc-sys", ns::OC_SYSTEM),
    ("oc-if", ns::OC_INTERFACES),
    ("oc-ip", ns::OC_IP),
    ("oc-eth", ns::OC_ETHERNET),
    ("oc-vlan", ns::OC_VLAN),
    ("oc-ni", ns::OC_NETWORK_INSTANCE),
    ("junos", ns::JUNOS_ROOT),
    ("j-vlans", ns::JUNOS_VLANS),
    ("j-sec", ns::JUNOS_SECURITY),
    ("j-if", ns::JUNOS_INTERFACES),
    ("j-ro", ns::JUNOS_ROUTING_OPTIONS),
]);

/// Which RPC a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    EditConfig,
    Dispatch,
}

/// Common surface of every payload shape.
pub trait Payload {
    fn operation(&self) -> Operation;

    /// User-level operation name, recorded in the ledger.
    fn name(&self) -> &str;

    /// Root element of the payload.
    fn as_element(&self) -> &Element;

    /// Serialized payload.
    fn as_string(&self) -> String {
        self.as_element().to_xml()
    }
}

macro_rules! payload_shape {
    ($(#[$meta:meta])* $ty:ident, $op:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $ty {
            name: String,
            element: Element,
        }

        impl $ty {
            pub fn new(name: impl Into<String>, element: Element) -> Self {
                Self {
                    name: name.into(),
                    element,
                }
            }

            pub fn into_element(self) -> Element {
                self.element
            }
        }

        impl Payload for $ty {
            fn operation(&self) -> Operation {
                $op
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn as_element(&self) -> &Element {
                &self.element
            }
        }
    };
}

payload_shape!(
    /// Subtree filter for `<get>` / `<get-config>`.
    GetFilter,
    Operation::Get
);

payload_shape!(
    /// Complete RPC element sent as-is.
    DispatchPayload,
    Operation::Dispatch
);

/// Content of `<edit-config><config>`, plus builder warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditConfigFilter {
    name: String,
    element: Element,
    warnings: Vec<String>,
}

impl EditConfigFilter {
    pub fn new(name: impl Into<String>, element: Element) -> Self {
        Self {
            name: name.into(),
            element,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Non-fatal notes produced while building (e.g. defaulted OSPF cost).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn into_element(self) -> Element {
        self.element
    }
}

impl Payload for EditConfigFilter {
    fn operation(&self) -> Operation {
        Operation::EditConfig
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn as_element(&self) -> &Element {
        &self.element
    }
}

// ============================================================================
// Specialization helpers
// ============================================================================

/// A template copy being specialized, remembering its key for errors.
pub(crate) struct Draft {
    key: TemplateKey,
    root: Element,
}

impl Draft {
    pub fn load(store: &TemplateStore, family: &str, action: Action, feature: &str) -> Result<Self> {
        let key = TemplateKey::new(family, action, feature);
        let root = store.instantiate(&key)?;
        Ok(Self { key, root })
    }

    pub fn root(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Element at a namespace-qualified path below the root.
    pub fn at(&mut self, path: &str) -> Result<&mut Element> {
        let key = &self.key;
        self.root
            .find_ns_mut(path, &NS)
            .ok_or_else(|| missing(key, path))
    }

    /// Set the text of the element at `path`.
    pub fn set(&mut self, path: &str, text: impl Into<String>) -> Result<()> {
        self.at(path)?.set_text(text);
        Ok(())
    }

    /// Remove the element at `path` from its parent.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let (parent_path, leaf) = path.rsplit_once('/').unwrap_or(("", path));
        let key = self.key.clone();
        let parent = if parent_path.is_empty() {
            &mut self.root
        } else {
            self.at(parent_path)?
        };
        let target = parent
            .find_ns(leaf, &NS)
            .cloned()
            .ok_or_else(|| missing(&key, path))?;
        let mut removed = false;
        parent.retain_children(|c| {
            if !removed && *c == target {
                removed = true;
                return false;
            }
            true
        });
        Ok(())
    }

    pub fn finish(self) -> Element {
        self.root
    }
}

fn missing(key: &TemplateKey, path: &str) -> Error {
    TemplateError::MissingElement {
        key: key.to_string(),
        path: path.to_string(),
    }
    .into()
}

/// Child in the parent's namespace.
pub(crate) fn child_of(parent: &Element, name: &str) -> Element {
    match parent.namespace() {
        Some(ns) => Element::in_namespace(ns, name),
        None => Element::new(name),
    }
}

/// Append a text leaf in the parent's namespace.
pub(crate) fn push_leaf<'a>(parent: &'a mut Element, name: &str, text: impl Into<String>) -> &'a mut Element {
    let leaf = child_of(parent, name).with_text(text);
    parent.push(leaf)
}

/// Append an empty container in the parent's namespace.
pub(crate) fn push_container<'a>(parent: &'a mut Element, name: &str) -> &'a mut Element {
    let container = child_of(parent, name);
    parent.push(container)
}

/// Annotate an element with `nc:operation="delete"`.
pub(crate) fn mark_delete(element: &mut Element) {
    element.set_attribute("xmlns:nc", NETCONF_BASE_NS);
    element.set_attribute("nc:operation", "delete");
}

/// Split an IOS-XE interface name into its type and number
/// (`GigabitEthernet0/1` -> `GigabitEthernet`, `0/1`).
pub(crate) fn split_interface_name(name: &str) -> Result<(&str, &str)> {
    static IFNAME: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^([A-Za-z][A-Za-z-]*)([0-9][0-9/.:]*)$").expect("static regex")
    });

    let caps = IFNAME
        .captures(name.trim())
        .ok_or_else(|| Error::invalid(format!("cannot split interface name '{}'", name)))?;
    match (caps.get(1), caps.get(2)) {
        (Some(kind), Some(number)) => Ok((kind.as_str(), number.as_str())),
        _ => Err(Error::invalid(format!("cannot split interface name '{}'", name))),
    }
}

pub(crate) fn require_interface(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid("interface name is empty"));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_interface_name() {
        assert_eq!(
            split_interface_name("GigabitEthernet1").unwrap(),
            ("GigabitEthernet", "1")
        );
        assert_eq!(
            split_interface_name("TenGigabitEthernet0/1/2").unwrap(),
            ("TenGigabitEthernet", "0/1/2")
        );
        assert_eq!(split_interface_name("Loopback0").unwrap(), ("Loopback", "0"));
        assert_eq!(split_interface_name("ge-0/0/0").unwrap(), ("ge-", "0/0/0"));
        assert!(split_interface_name("").is_err());
        assert!(split_interface_name("Gig").is_err());
    }

    #[test]
    fn test_mark_delete() {
        let mut el = Element::new("address");
        mark_delete(&mut el);
        let parsed = Element::parse(&el.to_xml()).unwrap();
        assert_eq!(parsed.attribute("nc:operation"), Some("delete"));
    }

    #[test]
    fn test_draft_remove_and_missing() {
        let store = test_support::store();
        let mut draft = Draft::load(&store, "Cisco-IOS-XE-native", Action::EditConfig, "create-vlan").unwrap();
        draft.remove("ios:vlan/vlan:vlan-list/vlan:name").unwrap();
        assert!(draft.at("ios:vlan/vlan:vlan-list/vlan:name").is_err());
        let err = draft.set("ios:nothing", "x").unwrap_err();
        assert!(err.to_string().contains("ios:nothing"));
    }
}
