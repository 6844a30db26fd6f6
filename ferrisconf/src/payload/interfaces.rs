//! `openconfig-interfaces` builders.

use ipnetwork::IpNetwork;

use super::{Draft, EditConfigFilter, GetFilter, mark_delete, push_container, push_leaf, require_interface};
use crate::error::Result;
use crate::model::{Switchport, SwitchportMode};
use crate::template::{Action, TemplateStore};

const FAMILY: &str = "openconfig-interfaces";

/// Interface state and configuration reads.
pub struct OpenConfigInterfaces<'a> {
    store: &'a TemplateStore,
}

impl<'a> OpenConfigInterfaces<'a> {
    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    /// Filter selecting every interface.
    pub fn get(&self) -> Result<GetFilter> {
        let draft = Draft::load(self.store, FAMILY, Action::Get, "interfaces")?;
        Ok(GetFilter::new("get_interfaces", draft.finish()))
    }

    /// Filter selecting one interface by name.
    pub fn get_one(&self, name: &str) -> Result<GetFilter> {
        require_interface(name)?;
        let mut draft = Draft::load(self.store, FAMILY, Action::Get, "interfaces")?;
        let interface = push_container(draft.root(), "interface");
        push_leaf(interface, "name", name);
        Ok(GetFilter::new("get_subinterfaces", draft.finish()))
    }
}

/// IPv4/IPv6 addresses on a subinterface.
pub struct OpenConfigAddress<'a> {
    store: &'a TemplateStore,
}

impl<'a> OpenConfigAddress<'a> {
    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    /// Add `address` to subinterface `index` of `interface`.
    pub fn add(&self, interface: &str, index: u32, address: IpNetwork) -> Result<EditConfigFilter> {
        let mut draft = self.draft(interface, index, address)?;
        let entry = entry_path(address);
        draft.set(&format!("{entry}/oc-ip:config/oc-ip:ip"), address.ip().to_string())?;
        draft.set(
            &format!("{entry}/oc-ip:config/oc-ip:prefix-length"),
            address.prefix().to_string(),
        )?;
        Ok(EditConfigFilter::new("add_interface_ip", draft.finish()))
    }

    /// Delete `address` from subinterface `index` of `interface`.
    ///
    /// The address entry carries `operation="delete"` and only its key.
    pub fn delete(&self, interface: &str, index: u32, address: IpNetwork) -> Result<EditConfigFilter> {
        let mut draft = self.draft(interface, index, address)?;
        let entry = entry_path(address);
        draft.remove(&format!("{entry}/oc-ip:config"))?;
        mark_delete(draft.at(&entry)?);
        Ok(EditConfigFilter::new("delete_interface_ip", draft.finish()))
    }

    /// Template with the list keys (interface, index, ip) filled in.
    fn draft(&self, interface: &str, index: u32, address: IpNetwork) -> Result<Draft> {
        require_interface(interface)?;
        let feature = match address {
            IpNetwork::V4(_) => "ipv4-address",
            IpNetwork::V6(_) => "ipv6-address",
        };
        let mut draft = Draft::load(self.store, FAMILY, Action::EditConfig, feature)?;
        draft.set("oc-if:interface/oc-if:name", interface)?;
        draft.set(
            "oc-if:interface/oc-if:subinterfaces/oc-if:subinterface/oc-if:index",
            index.to_string(),
        )?;
        draft.set(
            &format!("{}/oc-ip:ip", entry_path(address)),
            address.ip().to_string(),
        )?;
        Ok(draft)
    }
}

fn entry_path(address: IpNetwork) -> String {
    let family = match address {
        IpNetwork::V4(_) => "ipv4",
        IpNetwork::V6(_) => "ipv6",
    };
    format!(
        "oc-if:interface/oc-if:subinterfaces/oc-if:subinterface/oc-ip:{family}/oc-ip:addresses/oc-ip:address"
    )
}

/// Access / trunk VLAN membership of an Ethernet port.
pub struct OpenConfigSwitchedVlan<'a> {
    store: &'a TemplateStore,
}

impl<'a> OpenConfigSwitchedVlan<'a> {
    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    pub fn configure(&self, interface: &str, switchport: &Switchport) -> Result<EditConfigFilter> {
        require_interface(interface)?;
        switchport.validate()?;

        let mut draft = Draft::load(self.store, FAMILY, Action::EditConfig, "switched-vlan")?;
        draft.set("oc-if:interface/oc-if:name", interface)?;

        let config = "oc-if:interface/oc-eth:ethernet/oc-vlan:switched-vlan/oc-vlan:config";
        if let Some(mode) = switchport.mode.openconfig_name() {
            draft.set(&format!("{config}/oc-vlan:interface-mode"), mode)?;
        }

        let config = draft.at(config)?;
        match switchport.mode {
            SwitchportMode::Access => {
                if let Some(vlan) = switchport.vlans.first() {
                    push_leaf(config, "access-vlan", vlan.to_string());
                }
            }
            SwitchportMode::Trunk => {
                for vlan in &switchport.vlans {
                    push_leaf(config, "trunk-vlans", vlan.to_string());
                }
            }
            SwitchportMode::None => {}
        }
        Ok(EditConfigFilter::new("configure_interface_vlan", draft.finish()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VlanId;
    use crate::payload::test_support::store;
    use crate::payload::{Payload, ns};
    use crate::xml::Element;

    #[test]
    fn test_add_ipv4_address() {
        let store = store();
        let payload = OpenConfigAddress::new(&store)
            .add("GigabitEthernet1", 0, "10.0.0.2/24".parse().unwrap())
            .unwrap();
        let root = Element::parse(&payload.as_string()).unwrap();
        assert_eq!(root.namespace(), Some(ns::OC_INTERFACES));

        let root = root.stripped();
        let address = root
            .find("interface/subinterfaces/subinterface/ipv4/addresses/address")
            .unwrap();
        assert_eq!(address.find_text("ip"), Some("10.0.0.2"));
        assert_eq!(address.find_text("config/prefix-length"), Some("24"));
        assert_eq!(root.find_text("interface/name"), Some("GigabitEthernet1"));
        assert_eq!(root.find_text("interface/subinterfaces/subinterface/index"), Some("0"));
    }

    #[test]
    fn test_delete_marks_address() {
        let store = store();
        let payload = OpenConfigAddress::new(&store)
            .delete("GigabitEthernet1", 0, "10.0.0.1/24".parse().unwrap())
            .unwrap();
        let xml = payload.as_string();
        assert!(xml.contains(r#"nc:operation="delete""#));

        let root = Element::parse(&xml).unwrap();
        let address = root
            .find("*:interface/*:subinterfaces/*:subinterface/*:ipv4/*:addresses/*:address")
            .unwrap();
        assert_eq!(address.attribute_local("operation"), Some("delete"));
        assert!(address.find("*:config").is_none());
        assert_eq!(address.find_text("*:ip"), Some("10.0.0.1"));
    }

    #[test]
    fn test_ipv6_uses_ipv6_template() {
        let store = store();
        let payload = OpenConfigAddress::new(&store)
            .add("ge-0/0/1", 0, "2001:db8::1/64".parse().unwrap())
            .unwrap();
        let root = payload.as_element().clone().stripped();
        assert_eq!(
            root.find_text("interface/subinterfaces/subinterface/ipv6/addresses/address/config/prefix-length"),
            Some("64")
        );
    }

    #[test]
    fn test_switched_vlan_trunk() {
        let store = store();
        let vlans = [10, 20].map(|v| VlanId::new(v).unwrap());
        let payload = OpenConfigSwitchedVlan::new(&store)
            .configure("GigabitEthernet3", &Switchport::trunk(vlans))
            .unwrap();
        let root = payload.as_element().clone().stripped();
        let config = root.find("interface/ethernet/switched-vlan/config").unwrap();
        assert_eq!(config.find_text("interface-mode"), Some("TRUNK"));
        let trunk: Vec<_> = config.find_all("trunk-vlans").iter().filter_map(|e| e.text()).collect();
        assert_eq!(trunk, vec!["10", "20"]);
    }

    #[test]
    fn test_switched_vlan_access_namespace() {
        let store = store();
        let payload = OpenConfigSwitchedVlan::new(&store)
            .configure("GigabitEthernet3", &Switchport::access(VlanId::new(30).unwrap()))
            .unwrap();
        let access = payload
            .as_element()
            .find_ns(
                "oc-if:interface/oc-eth:ethernet/oc-vlan:switched-vlan/oc-vlan:config/oc-vlan:access-vlan",
                &crate::payload::NS,
            )
            .unwrap();
        assert_eq!(access.text(), Some("30"));
    }

    #[test]
    fn test_get_one_selects_interface() {
        let store = store();
        let filter = OpenConfigInterfaces::new(&store).get_one("GigabitEthernet1").unwrap();
        assert_eq!(
            filter.as_string(),
            format!(
                r#"<interfaces xmlns="{}"><interface><name>GigabitEthernet1</name></interface></interfaces>"#,
                ns::OC_INTERFACES
            )
        );
        assert!(OpenConfigInterfaces::new(&store).get_one(" ").is_err());
    }
}
