//! Interface records.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use serde::{Deserialize, Serialize};

use super::vlan::VlanId;
use crate::error::{Error, Result};

/// Administrative state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminState {
    Up,
    Down,
    Testing,
}

impl FromStr for AdminState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "UP" => Ok(AdminState::Up),
            "DOWN" => Ok(AdminState::Down),
            "TESTING" => Ok(AdminState::Testing),
            _ => Err(Error::invalid(format!("unknown admin state '{}'", s))),
        }
    }
}

/// Operational state of an interface (RFC 2863 values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperState {
    Up,
    Down,
    Testing,
    Unknown,
    Dormant,
    NotPresent,
    LowerLayerDown,
}

impl FromStr for OperState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "UP" => Ok(OperState::Up),
            "DOWN" => Ok(OperState::Down),
            "TESTING" => Ok(OperState::Testing),
            "UNKNOWN" => Ok(OperState::Unknown),
            "DORMANT" => Ok(OperState::Dormant),
            "NOT_PRESENT" => Ok(OperState::NotPresent),
            "LOWER_LAYER_DOWN" => Ok(OperState::LowerLayerDown),
            _ => Err(Error::invalid(format!("unknown oper state '{}'", s))),
        }
    }
}

/// Layer-2 mode of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchportMode {
    Access,
    Trunk,
    #[default]
    None,
}

impl SwitchportMode {
    /// OpenConfig `interface-mode` value.
    pub fn openconfig_name(&self) -> Option<&'static str> {
        match self {
            SwitchportMode::Access => Some("ACCESS"),
            SwitchportMode::Trunk => Some("TRUNK"),
            SwitchportMode::None => None,
        }
    }
}

impl fmt::Display for SwitchportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SwitchportMode::Access => "access",
            SwitchportMode::Trunk => "trunk",
            SwitchportMode::None => "none",
        })
    }
}

/// Vendor-independent switchport record.
///
/// Access ports carry exactly one VLAN; trunks carry the allowed list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Switchport {
    pub mode: SwitchportMode,
    pub vlans: Vec<VlanId>,
}

impl Switchport {
    pub fn access(vlan: VlanId) -> Self {
        Self {
            mode: SwitchportMode::Access,
            vlans: vec![vlan],
        }
    }

    pub fn trunk(vlans: impl IntoIterator<Item = VlanId>) -> Self {
        let mut out: Vec<VlanId> = Vec::new();
        for vlan in vlans {
            if !out.contains(&vlan) {
                out.push(vlan);
            }
        }
        Self {
            mode: SwitchportMode::Trunk,
            vlans: out,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self.mode {
            SwitchportMode::Access if self.vlans.len() != 1 => Err(Error::invalid(
                "access port must carry exactly one VLAN",
            )),
            SwitchportMode::Trunk if self.vlans.is_empty() => {
                Err(Error::invalid("trunk port needs at least one VLAN"))
            }
            SwitchportMode::None => Err(Error::invalid("switchport mode must be access or trunk")),
            _ => Ok(()),
        }
    }
}

/// A logical subinterface with its addresses.
///
/// Addresses are kept distinct; insertion order is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subinterface {
    pub index: u32,
    ipv4: Vec<Ipv4Network>,
    ipv6: Vec<Ipv6Network>,
}

impl Subinterface {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    pub fn ipv4(&self) -> &[Ipv4Network] {
        &self.ipv4
    }

    pub fn ipv6(&self) -> &[Ipv6Network] {
        &self.ipv6
    }

    /// Add an address; duplicates are ignored. Returns whether it was new.
    pub fn add_address(&mut self, address: IpNetwork) -> bool {
        match address {
            IpNetwork::V4(v4) if !self.ipv4.contains(&v4) => {
                self.ipv4.push(v4);
                true
            }
            IpNetwork::V6(v6) if !self.ipv6.contains(&v6) => {
                self.ipv6.push(v6);
                true
            }
            _ => false,
        }
    }
}

/// One interface as read from the device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub admin_state: Option<AdminState>,
    pub oper_state: Option<OperState>,
    pub description: Option<String>,
    pub switchport: Switchport,
    pub subinterfaces: Vec<Subinterface>,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// First IPv4 address of the first subinterface.
    pub fn representative_ipv4(&self) -> Option<Ipv4Network> {
        self.subinterfaces.first()?.ipv4.first().copied()
    }

    /// First IPv6 address of the first subinterface.
    pub fn representative_ipv6(&self) -> Option<Ipv6Network> {
        self.subinterfaces.first()?.ipv6.first().copied()
    }
}

/// Build an interface address, rejecting prefix lengths out of range.
pub fn interface_address(ip: IpAddr, prefix: u8) -> Result<IpNetwork> {
    IpNetwork::new(ip, prefix).map_err(|_| {
        let max = if ip.is_ipv4() { 32 } else { 128 };
        Error::invalid(format!(
            "prefix length {} for {} is outside 0-{}",
            prefix, ip, max
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_parsing() {
        assert_eq!("up".parse::<AdminState>().unwrap(), AdminState::Up);
        assert_eq!(
            "LOWER_LAYER_DOWN".parse::<OperState>().unwrap(),
            OperState::LowerLayerDown
        );
        assert_eq!(
            "lower-layer-down".parse::<OperState>().unwrap(),
            OperState::LowerLayerDown
        );
        assert!("SIDEWAYS".parse::<AdminState>().is_err());
    }

    #[test]
    fn test_subinterface_addresses_distinct() {
        let mut sub = Subinterface::new(0);
        let addr: IpNetwork = "10.0.0.1/24".parse().unwrap();
        assert!(sub.add_address(addr));
        assert!(!sub.add_address(addr));
        assert!(sub.add_address("2001:db8::1/64".parse().unwrap()));
        assert_eq!(sub.ipv4().len(), 1);
        assert_eq!(sub.ipv6().len(), 1);
    }

    #[test]
    fn test_representative_address() {
        let mut iface = Interface::new("GigabitEthernet1");
        assert_eq!(iface.representative_ipv4(), None);

        let mut first = Subinterface::new(0);
        first.add_address("10.0.0.1/24".parse().unwrap());
        first.add_address("10.0.1.1/24".parse().unwrap());
        let mut second = Subinterface::new(1);
        second.add_address("192.168.0.1/24".parse().unwrap());
        iface.subinterfaces = vec![first, second];

        assert_eq!(
            iface.representative_ipv4(),
            Some("10.0.0.1/24".parse().unwrap())
        );
        assert_eq!(iface.representative_ipv6(), None);
    }

    #[test]
    fn test_interface_address_bounds() {
        assert!(interface_address("10.0.0.1".parse().unwrap(), 32).is_ok());
        assert!(interface_address("10.0.0.1".parse().unwrap(), 33).is_err());
        assert!(interface_address("2001:db8::1".parse().unwrap(), 128).is_ok());
        assert!(interface_address("2001:db8::1".parse().unwrap(), 129).is_err());
    }

    #[test]
    fn test_switchport_validation() {
        let vlan = VlanId::new(10).unwrap();
        assert!(Switchport::access(vlan).validate().is_ok());
        assert!(Switchport::trunk([]).validate().is_err());
        assert_eq!(Switchport::trunk([vlan, vlan]).vlans.len(), 1);
        assert!(Switchport::default().validate().is_err());
    }
}
