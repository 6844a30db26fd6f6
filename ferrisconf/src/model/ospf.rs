//! OSPFv2 configuration record.

use std::net::Ipv4Addr;

use indexmap::{IndexMap, IndexSet};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// OSPFv2 configuration for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OspfConfig {
    /// Process id (IOS-XE) / protocol instance name (OpenConfig).
    pub process_id: u16,
    /// Area in dotted-quad or decimal form.
    pub area: String,
    pub router_id: Option<Ipv4Addr>,
    pub hello_interval: Option<u16>,
    pub dead_interval: Option<u16>,
    /// Reference bandwidth in Mb/s.
    pub reference_bandwidth_mbps: Option<u32>,
    pub passive_interfaces: IndexSet<String>,
    /// Interface name to the networks advertised on it.
    pub networks: IndexMap<String, Vec<Ipv4Network>>,
}

impl Default for OspfConfig {
    fn default() -> Self {
        Self {
            process_id: 1,
            area: String::new(),
            router_id: None,
            hello_interval: None,
            dead_interval: None,
            reference_bandwidth_mbps: None,
            passive_interfaces: IndexSet::new(),
            networks: IndexMap::new(),
        }
    }
}

impl OspfConfig {
    pub fn new(area: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            ..Default::default()
        }
    }

    pub fn with_process_id(mut self, process_id: u16) -> Self {
        self.process_id = process_id;
        self
    }

    pub fn with_router_id(mut self, router_id: Ipv4Addr) -> Self {
        self.router_id = Some(router_id);
        self
    }

    pub fn with_timers(mut self, hello: u16, dead: u16) -> Self {
        self.hello_interval = Some(hello);
        self.dead_interval = Some(dead);
        self
    }

    pub fn with_reference_bandwidth(mut self, mbps: u32) -> Self {
        self.reference_bandwidth_mbps = Some(mbps);
        self
    }

    pub fn with_passive(mut self, interface: impl Into<String>) -> Self {
        self.passive_interfaces.insert(interface.into());
        self
    }

    /// Advertise `network` on `interface`.
    pub fn with_network(mut self, interface: impl Into<String>, network: Ipv4Network) -> Self {
        let entry = self.networks.entry(interface.into()).or_default();
        if !entry.contains(&network) {
            entry.push(network);
        }
        self
    }

    /// Interfaces taking part in OSPF: networks first, then passive-only ones.
    pub fn interfaces(&self) -> IndexSet<&str> {
        self.networks
            .keys()
            .map(String::as_str)
            .chain(self.passive_interfaces.iter().map(String::as_str))
            .collect()
    }

    /// Area as a dotted quad; decimal areas are converted.
    pub fn area_dotted(&self) -> Result<Ipv4Addr> {
        let area = self.area.trim();
        if let Ok(dotted) = area.parse::<Ipv4Addr>() {
            return Ok(dotted);
        }
        area.parse::<u32>()
            .map(Ipv4Addr::from)
            .map_err(|_| Error::invalid(format!("invalid OSPF area '{}'", self.area)))
    }

    /// Area as a decimal number, the IOS-XE `network ... area` form.
    pub fn area_decimal(&self) -> Result<u32> {
        self.area_dotted().map(u32::from)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.area.trim().is_empty() {
            return Err(Error::invalid("OSPF area is required"));
        }
        self.area_dotted()?;

        if self.process_id == 0 {
            return Err(Error::invalid("OSPF process id must be at least 1"));
        }
        if self.hello_interval == Some(0) {
            return Err(Error::invalid("OSPF hello interval must be at least 1"));
        }
        if let (Some(hello), Some(dead)) = (self.hello_interval, self.dead_interval) {
            if dead <= hello {
                return Err(Error::invalid(format!(
                    "OSPF dead interval {} must exceed hello interval {}",
                    dead, hello
                )));
            }
        }
        if self.reference_bandwidth_mbps == Some(0) {
            return Err(Error::invalid("reference bandwidth must be at least 1 Mb/s"));
        }
        if self.interfaces().iter().any(|name| name.trim().is_empty()) {
            return Err(Error::invalid("OSPF interface name is empty"));
        }
        Ok(())
    }
}
