//! Typed domain records exchanged with the manager.

mod device;
mod interface;
mod ipsec;
mod ospf;
mod vlan;

pub use device::{Capabilities, DeviceId, Vendor, capability};
pub use interface::{
    AdminState, Interface, OperState, Subinterface, Switchport, SwitchportMode, interface_address,
};
pub use ipsec::{
    ACL_RANGE, DhGroup, EspIntegrity, Encryption, IKE_LIFETIME_RANGE, IPSEC_LIFETIME_RANGE,
    IkeHash, IkeParameters, IosXeIpsecOptions, IpsecParameters, JunosIpsecOptions, PeerParameters,
};
pub use ospf::OspfConfig;
pub use vlan::{Vlan, VlanId};

use std::net::Ipv4Addr;

/// A Junos security zone and its member interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SecurityZone {
    pub name: String,
    pub interfaces: Vec<String>,
}

/// The crypto map binding read back from an IOS-XE configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CryptoMapSummary {
    pub name: Option<String>,
    pub transform_set: Option<String>,
    pub peer: Option<Ipv4Addr>,
    pub isakmp_policy: Option<u16>,
    pub acl: Option<String>,
}
