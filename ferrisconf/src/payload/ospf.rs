//! OSPFv2 builders.
//!
//! IOS-XE takes the reference bandwidth directly. OpenConfig has no such
//! knob, so the OpenConfig builder derives a per-interface metric from the
//! nominal link speed implied by the interface name.

use std::net::Ipv4Addr;

use log::warn;

use super::{Draft, EditConfigFilter, child_of, push_container, push_leaf, split_interface_name};
use crate::error::Result;
use crate::model::OspfConfig;
use crate::payload::ns;
use crate::template::{Action, TemplateStore};
use crate::xml::Element;

/// Interface name prefixes and their nominal speed in bit/s.
const SPEED_PREFIXES: &[(&str, u64)] = &[
    ("TenGigabitEthernet", 10_000_000_000),
    ("GigabitEthernet", 1_000_000_000),
    ("FastEthernet", 100_000_000),
    ("xe", 10_000_000_000),
    ("ge", 1_000_000_000),
    ("fe", 100_000_000),
];

/// Nominal speed of an interface, inferred from its name.
pub fn nominal_speed_bps(interface: &str) -> Option<u64> {
    SPEED_PREFIXES
        .iter()
        .find(|(prefix, _)| interface.starts_with(prefix))
        .map(|(_, speed)| *speed)
}

/// OSPF cost for `interface` under `reference_mbps`.
///
/// Returns the cost (at least 1) and a warning when the speed is unknown.
pub fn ospf_cost(reference_mbps: u32, interface: &str) -> (u64, Option<String>) {
    match nominal_speed_bps(interface) {
        Some(speed) => {
            let cost = u64::from(reference_mbps) * 1_000_000 / speed;
            (cost.max(1), None)
        }
        None => (
            1,
            Some(format!(
                "unknown link speed for interface '{}', using OSPF cost 1",
                interface
            )),
        ),
    }
}

fn wildcard(mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(!u32::from(mask))
}

/// `Cisco-IOS-XE-native` / `Cisco-IOS-XE-ospf` router process.
pub struct NativeOspf<'a> {
    store: &'a TemplateStore,
}

impl<'a> NativeOspf<'a> {
    pub const FAMILY: &'static str = "Cisco-IOS-XE-native";

    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Result<super::GetFilter> {
        let draft = Draft::load(self.store, Self::FAMILY, Action::Get, "ospf")?;
        Ok(super::GetFilter::new("get_ospf", draft.finish()))
    }

    pub fn configure(&self, config: &OspfConfig) -> Result<EditConfigFilter> {
        config.validate()?;
        let area = config.area_decimal()?.to_string();
        let timed = config.hello_interval.is_some() || config.dead_interval.is_some();
        // Resolve interface names before touching the template
        let interfaces = config
            .interfaces()
            .into_iter()
            .map(|name| split_interface_name(name).map(|(kind, number)| (kind.to_string(), number.to_string())))
            .collect::<Result<Vec<_>>>()?;

        let mut draft = Draft::load(self.store, Self::FAMILY, Action::EditConfig, "configure-ospf")?;
        let process = draft.at("ios:router/ospf:router-ospf/ospf:ospf/ospf:process-id")?;
        if let Some(id) = process.find_ns_mut("ospf:id", &super::NS) {
            id.set_text(config.process_id.to_string());
        }

        if let Some(router_id) = config.router_id {
            push_leaf(process, "router-id", router_id.to_string());
        }
        if let Some(reference) = config.reference_bandwidth_mbps {
            let auto_cost = push_container(process, "auto-cost");
            push_leaf(auto_cost, "reference-bandwidth", reference.to_string());
        }
        for networks in config.networks.values() {
            for network in networks {
                let entry = push_container(process, "network");
                push_leaf(entry, "ip", network.network().to_string());
                push_leaf(entry, "wildcard", wildcard(network.mask()).to_string());
                push_leaf(entry, "area", area.as_str());
            }
        }
        for passive in &config.passive_interfaces {
            let entry = push_container(process, "passive-interface");
            push_leaf(entry, "interface", passive.as_str());
        }

        if timed {
            let container = draft.at("ios:interface")?;
            for (kind, number) in &interfaces {
                let entry = push_container(container, kind);
                push_leaf(entry, "name", number.as_str());
                let ip = push_container(entry, "ip");
                let ospf = ip
                    .push(Element::in_namespace(ns::IOS_OSPF, "router-ospf"))
                    .push(Element::in_namespace(ns::IOS_OSPF, "ospf"));
                if let Some(hello) = config.hello_interval {
                    push_leaf(ospf, "hello-interval", hello.to_string());
                }
                if let Some(dead) = config.dead_interval {
                    push_leaf(ospf, "dead-interval", dead.to_string());
                }
            }
        } else {
            draft.remove("ios:interface")?;
        }

        Ok(EditConfigFilter::new("configure_ospf", draft.finish()))
    }
}

/// `openconfig-network-instance` OSPFv2 protocol on the default instance.
pub struct OpenConfigOspf<'a> {
    store: &'a TemplateStore,
}

impl<'a> OpenConfigOspf<'a> {
    pub const FAMILY: &'static str = "openconfig-network-instance";

    const PROTOCOL: &'static str = "oc-ni:network-instance/oc-ni:protocols/oc-ni:protocol";

    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Result<super::GetFilter> {
        let draft = Draft::load(self.store, Self::FAMILY, Action::Get, "ospf")?;
        Ok(super::GetFilter::new("get_ospf", draft.finish()))
    }

    pub fn configure(&self, config: &OspfConfig) -> Result<EditConfigFilter> {
        config.validate()?;
        let area = config.area_dotted()?.to_string();
        let mut warnings = Vec::new();

        let mut draft = Draft::load(self.store, Self::FAMILY, Action::EditConfig, "configure-ospf")?;
        let protocol = Self::PROTOCOL;
        let instance = config.process_id.to_string();
        draft.set(&format!("{protocol}/oc-ni:name"), instance.as_str())?;
        draft.set(&format!("{protocol}/oc-ni:config/oc-ni:name"), instance.as_str())?;

        match config.router_id {
            Some(router_id) => {
                let global = draft.at(&format!("{protocol}/oc-ni:ospfv2/oc-ni:global/oc-ni:config"))?;
                push_leaf(global, "router-id", router_id.to_string());
            }
            None => draft.remove(&format!("{protocol}/oc-ni:ospfv2/oc-ni:global"))?,
        }

        let area_path = format!("{protocol}/oc-ni:ospfv2/oc-ni:areas/oc-ni:area");
        draft.set(&format!("{area_path}/oc-ni:identifier"), area.as_str())?;
        draft.set(&format!("{area_path}/oc-ni:config/oc-ni:identifier"), area.as_str())?;

        let container = draft.at(&format!("{area_path}/oc-ni:interfaces"))?;
        for name in config.interfaces() {
            let mut entry = child_of(container, "interface");
            push_leaf(&mut entry, "id", name);

            let if_config = push_container(&mut entry, "config");
            push_leaf(if_config, "id", name);
            if let Some(reference) = config.reference_bandwidth_mbps {
                let (cost, warning) = ospf_cost(reference, name);
                if let Some(warning) = warning {
                    warn!("{}", warning);
                    warnings.push(warning);
                }
                push_leaf(if_config, "metric", cost.to_string());
            }
            if config.passive_interfaces.contains(name) {
                push_leaf(if_config, "passive", "true");
            }

            if config.hello_interval.is_some() || config.dead_interval.is_some() {
                let timers = push_container(push_container(&mut entry, "timers"), "config");
                if let Some(dead) = config.dead_interval {
                    push_leaf(timers, "dead-interval", dead.to_string());
                }
                if let Some(hello) = config.hello_interval {
                    push_leaf(timers, "hello-interval", hello.to_string());
                }
            }
            container.push(entry);
        }

        Ok(EditConfigFilter::new("configure_ospf", draft.finish()).with_warnings(warnings))
    }
}
