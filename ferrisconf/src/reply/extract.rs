//! Domain record extraction from stripped reply trees.
//!
//! Every extractor accepts any element of a reply (the `<rpc-reply>`, its
//! `<data>` or the model root itself) and locates the model root by name.
//! Missing leaves become `None`; unparseable values are skipped with a
//! debug log.

use std::net::IpAddr;
use std::str::FromStr;

use log::debug;

use crate::model::{
    AdminState, Capabilities, CryptoMapSummary, Interface, OperState, SecurityZone, Subinterface,
    Switchport, Vlan, VlanId, interface_address,
};
use crate::xml::Element;

/// First element named `name` in document order, `tree` included.
fn locate<'a>(tree: &'a Element, name: &str) -> Option<&'a Element> {
    if tree.name() == name {
        return Some(tree);
    }
    tree.children().iter().find_map(|c| locate(c, name))
}

fn parse_text<T: FromStr>(element: &Element, path: &str) -> Option<T> {
    let text = element.find_text(path)?;
    match text.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!("Ignoring unparseable <{}> value '{}'", path, text);
            None
        }
    }
}

fn first_text(element: &Element, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .find_map(|p| element.find_text(p))
        .map(str::to_string)
}

/// OpenConfig `interfaces/interface` entries.
pub fn to_interfaces(tree: &Element) -> Vec<Interface> {
    let Some(root) = locate(tree, "interfaces") else {
        return Vec::new();
    };
    root.find_all("interface").into_iter().filter_map(interface).collect()
}

/// Subinterfaces of the interface called `name`.
pub fn to_subinterfaces(tree: &Element, name: &str) -> Vec<Subinterface> {
    to_interfaces(tree)
        .into_iter()
        .find(|i| i.name == name)
        .map(|i| i.subinterfaces)
        .unwrap_or_default()
}

fn interface(element: &Element) -> Option<Interface> {
    let name = first_text(element, &["name", "config/name"])?;
    let mut interface = Interface::new(name);

    interface.admin_state = parse_text::<AdminState>(element, "state/admin-status");
    interface.oper_state = parse_text::<OperState>(element, "state/oper-status");
    interface.description = first_text(element, &["state/description", "config/description"]);
    interface.subinterfaces = element
        .find_all("subinterfaces/subinterface")
        .into_iter()
        .filter_map(subinterface)
        .collect();
    if let Some(switched) = element.find("ethernet/switched-vlan") {
        interface.switchport = switchport(switched);
    }
    Some(interface)
}

fn subinterface(element: &Element) -> Option<Subinterface> {
    let index = parse_text::<u32>(element, "index").or_else(|| parse_text(element, "config/index"))?;
    let mut sub = Subinterface::new(index);
    for family in ["ipv4", "ipv6"] {
        for address in element.find_all(&format!("{family}/addresses/address")) {
            let ip = parse_text::<IpAddr>(address, "ip")
                .or_else(|| parse_text(address, "config/ip"))
                .or_else(|| parse_text(address, "state/ip"));
            let prefix = parse_text::<u8>(address, "config/prefix-length")
                .or_else(|| parse_text(address, "state/prefix-length"));
            let (Some(ip), Some(prefix)) = (ip, prefix) else {
                continue;
            };
            match interface_address(ip, prefix) {
                Ok(network) => {
                    sub.add_address(network);
                }
                Err(e) => debug!("Skipping address on subinterface {}: {}", index, e),
            }
        }
    }
    Some(sub)
}

fn switchport(switched: &Element) -> Switchport {
    let Some(config) = switched.find("config").or_else(|| switched.find("state")) else {
        return Switchport::default();
    };
    match config.find_text("interface-mode") {
        Some("ACCESS") => match parse_text::<u16>(config, "access-vlan").map(VlanId::new) {
            Some(Ok(vlan)) => Switchport::access(vlan),
            _ => Switchport::default(),
        },
        Some("TRUNK") => Switchport::trunk(
            config
                .find_all("trunk-vlans")
                .into_iter()
                .filter_map(|v| v.text()?.parse::<u16>().ok())
                .filter_map(|v| VlanId::new(v).ok()),
        ),
        _ => Switchport::default(),
    }
}

/// VLANs from either the IOS-XE `native/vlan/vlan-list` or the Junos
/// `configuration/vlans/vlan` shape.
pub fn to_vlans(tree: &Element) -> Vec<Vlan> {
    let mut vlans = Vec::new();

    if let Some(native) = locate(tree, "native") {
        for entry in native.find_all("vlan/vlan-list") {
            let Some(id) = parse_text::<u16>(entry, "id").and_then(|v| VlanId::new(v).ok()) else {
                continue;
            };
            vlans.push(Vlan {
                id,
                name: entry.find_text("name").map(str::to_string),
            });
        }
    }

    if let Some(configuration) = locate(tree, "configuration") {
        for entry in configuration.find_all("vlans/vlan") {
            let Some(id) = parse_text::<u16>(entry, "vlan-id").and_then(|v| VlanId::new(v).ok()) else {
                continue;
            };
            vlans.push(Vlan {
                id,
                name: entry.find_text("name").map(str::to_string),
            });
        }
    }

    vlans
}

/// Capability URIs of a `<hello>`.
pub fn to_capabilities(tree: &Element) -> Capabilities {
    locate(tree, "capabilities")
        .map(|caps| {
            caps.find_all("capability")
                .into_iter()
                .filter_map(Element::text)
                .collect()
        })
        .unwrap_or_default()
}

/// Hostname from IOS-XE native, OpenConfig system or Junos configuration.
pub fn to_hostname(tree: &Element) -> Option<String> {
    if let Some(hostname) = locate(tree, "native").and_then(|n| n.find_text("hostname")) {
        return Some(hostname.to_string());
    }
    if let Some(hostname) = locate(tree, "system").and_then(|s| {
        s.find_text("config/hostname")
            .or_else(|| s.find_text("state/hostname"))
            .or_else(|| s.find_text("host-name"))
    }) {
        return Some(hostname.to_string());
    }
    None
}

/// Junos `get-zones-information` reply.
pub fn to_zones(tree: &Element) -> Vec<SecurityZone> {
    let Some(info) = locate(tree, "zones-information") else {
        return Vec::new();
    };
    info.find_all("zones-security")
        .into_iter()
        .filter_map(|zone| {
            let name = zone.find_text("zones-security-zonename")?.to_string();
            let interfaces = zone
                .find_all("zones-security-interfaces/zones-security-interface-name")
                .into_iter()
                .filter_map(Element::text)
                .map(str::to_string)
                .collect();
            Some(SecurityZone { name, interfaces })
        })
        .collect()
}

/// IOS-XE crypto map binding and the ISAKMP policy number.
pub fn to_crypto_map(tree: &Element) -> CryptoMapSummary {
    let Some(crypto) = locate(tree, "crypto") else {
        return CryptoMapSummary::default();
    };
    let map = crypto.find("map");
    CryptoMapSummary {
        name: map.and_then(|m| m.find_text("tag")).map(str::to_string),
        transform_set: map
            .and_then(|m| m.find_text("set/transform-set"))
            .map(str::to_string),
        peer: map.and_then(|m| parse_text(m, "set/peer/address")),
        isakmp_policy: parse_text(crypto, "isakmp/policy/number"),
        acl: map.and_then(|m| m.find_text("match/address")).map(str::to_string),
    }
}
