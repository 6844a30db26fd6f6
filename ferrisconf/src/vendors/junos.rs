//! Juniper Junos dialect.
//!
//! Hostname and OSPF go through OpenConfig; VLANs and IPSec through the
//! `junos-conf-root` models. Uncommitted changes are dropped with a
//! `rollback 0` RPC.

use super::VendorDialect;
use crate::error::Result;
use crate::model::{IkeParameters, IpsecParameters, OspfConfig, PeerParameters, Vendor, Vlan};
use crate::payload::{
    DispatchPayload, EditConfigFilter, GetFilter, JunosIpsec, JunosRollback, JunosVlan, JunosZones,
    OpenConfigHostname, OpenConfigOspf,
};
use crate::template::TemplateStore;

#[derive(Debug, Default, Clone, Copy)]
pub struct JunosDialect;

impl VendorDialect for JunosDialect {
    fn vendor(&self) -> Vendor {
        Vendor::Junos
    }

    fn get_hostname(&self, store: &TemplateStore) -> Result<GetFilter> {
        OpenConfigHostname::new(store).get()
    }

    fn set_hostname(&self, store: &TemplateStore, hostname: &str) -> Result<EditConfigFilter> {
        OpenConfigHostname::new(store).set(hostname)
    }

    fn get_vlans(&self, store: &TemplateStore) -> Result<GetFilter> {
        JunosVlan::new(store).get()
    }

    fn create_vlan(&self, store: &TemplateStore, vlan: &Vlan) -> Result<EditConfigFilter> {
        JunosVlan::new(store).create(vlan)
    }

    fn delete_vlan(&self, store: &TemplateStore, vlan: &Vlan) -> Result<EditConfigFilter> {
        JunosVlan::new(store).delete(vlan)
    }

    fn get_ospf(&self, store: &TemplateStore) -> Result<GetFilter> {
        OpenConfigOspf::new(store).get()
    }

    fn configure_ospf(&self, store: &TemplateStore, config: &OspfConfig) -> Result<EditConfigFilter> {
        OpenConfigOspf::new(store).configure(config)
    }

    fn configure_ipsec(
        &self,
        store: &TemplateStore,
        peer: &PeerParameters,
        ike: &IkeParameters,
        ipsec: &IpsecParameters,
    ) -> Result<EditConfigFilter> {
        JunosIpsec::new(store).configure(peer, ike, ipsec)
    }

    fn discard_payload(&self, store: &TemplateStore) -> Result<Option<DispatchPayload>> {
        JunosRollback::new(store).payload().map(Some)
    }

    fn get_zones(&self, store: &TemplateStore) -> Result<DispatchPayload> {
        JunosZones::new(store).payload()
    }
}
