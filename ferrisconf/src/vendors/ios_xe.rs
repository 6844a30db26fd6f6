//! Cisco IOS-XE dialect: native models for everything but interfaces.

use super::VendorDialect;
use crate::error::Result;
use crate::model::{IkeParameters, IpsecParameters, OspfConfig, PeerParameters, Vendor, Vlan};
use crate::payload::{EditConfigFilter, GetFilter, NativeHostname, NativeIpsec, NativeOspf, NativeVlan};
use crate::template::TemplateStore;

#[derive(Debug, Default, Clone, Copy)]
pub struct IosXeDialect;

impl VendorDialect for IosXeDialect {
    fn vendor(&self) -> Vendor {
        Vendor::IosXe
    }

    fn get_hostname(&self, store: &TemplateStore) -> Result<GetFilter> {
        NativeHostname::new(store).get()
    }

    fn set_hostname(&self, store: &TemplateStore, hostname: &str) -> Result<EditConfigFilter> {
        NativeHostname::new(store).set(hostname)
    }

    fn get_vlans(&self, store: &TemplateStore) -> Result<GetFilter> {
        NativeVlan::new(store).get()
    }

    fn create_vlan(&self, store: &TemplateStore, vlan: &Vlan) -> Result<EditConfigFilter> {
        NativeVlan::new(store).create(vlan)
    }

    fn delete_vlan(&self, store: &TemplateStore, vlan: &Vlan) -> Result<EditConfigFilter> {
        NativeVlan::new(store).delete(vlan.id)
    }

    fn get_ospf(&self, store: &TemplateStore) -> Result<GetFilter> {
        NativeOspf::new(store).get()
    }

    fn configure_ospf(&self, store: &TemplateStore, config: &OspfConfig) -> Result<EditConfigFilter> {
        NativeOspf::new(store).configure(config)
    }

    fn configure_ipsec(
        &self,
        store: &TemplateStore,
        peer: &PeerParameters,
        ike: &IkeParameters,
        ipsec: &IpsecParameters,
    ) -> Result<EditConfigFilter> {
        NativeIpsec::new(store).configure(peer, ike, ipsec)
    }

    fn get_crypto_map(&self, store: &TemplateStore) -> Result<GetFilter> {
        NativeIpsec::new(store).get()
    }
}
