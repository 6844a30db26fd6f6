//! Vendor dialects.
//!
//! A dialect maps each user-level operation onto the payload builder for
//! one vendor. Interface reads and address edits use OpenConfig on every
//! vendor; hostname, VLAN, OSPF and IPSec use the model each platform
//! handles natively.

mod ios_xe;
mod junos;

pub use ios_xe::IosXeDialect;
pub use junos::JunosDialect;

use ipnetwork::IpNetwork;

use crate::error::{Error, Result, SessionError};
use crate::model::{IkeParameters, IpsecParameters, OspfConfig, PeerParameters, Switchport, Vendor, Vlan};
use crate::payload::{
    DispatchPayload, EditConfigFilter, GetFilter, OpenConfigAddress, OpenConfigInterfaces,
    OpenConfigSwitchedVlan,
};
use crate::template::TemplateStore;

/// Payload selection for one vendor.
pub trait VendorDialect: Send + Sync {
    fn vendor(&self) -> Vendor;

    fn get_hostname(&self, store: &TemplateStore) -> Result<GetFilter>;

    fn set_hostname(&self, store: &TemplateStore, hostname: &str) -> Result<EditConfigFilter>;

    fn get_interfaces(&self, store: &TemplateStore) -> Result<GetFilter> {
        OpenConfigInterfaces::new(store).get()
    }

    fn get_interface(&self, store: &TemplateStore, name: &str) -> Result<GetFilter> {
        OpenConfigInterfaces::new(store).get_one(name)
    }

    fn add_interface_ip(
        &self,
        store: &TemplateStore,
        interface: &str,
        index: u32,
        address: IpNetwork,
    ) -> Result<EditConfigFilter> {
        OpenConfigAddress::new(store).add(interface, index, address)
    }

    fn delete_interface_ip(
        &self,
        store: &TemplateStore,
        interface: &str,
        index: u32,
        address: IpNetwork,
    ) -> Result<EditConfigFilter> {
        OpenConfigAddress::new(store).delete(interface, index, address)
    }

    fn configure_interface_vlan(
        &self,
        store: &TemplateStore,
        interface: &str,
        switchport: &Switchport,
    ) -> Result<EditConfigFilter> {
        OpenConfigSwitchedVlan::new(store).configure(interface, switchport)
    }

    fn get_vlans(&self, store: &TemplateStore) -> Result<GetFilter>;

    fn create_vlan(&self, store: &TemplateStore, vlan: &Vlan) -> Result<EditConfigFilter>;

    fn delete_vlan(&self, store: &TemplateStore, vlan: &Vlan) -> Result<EditConfigFilter>;

    fn get_ospf(&self, store: &TemplateStore) -> Result<GetFilter>;

    fn configure_ospf(&self, store: &TemplateStore, config: &OspfConfig) -> Result<EditConfigFilter>;

    fn configure_ipsec(
        &self,
        store: &TemplateStore,
        peer: &PeerParameters,
        ike: &IkeParameters,
        ipsec: &IpsecParameters,
    ) -> Result<EditConfigFilter>;

    fn get_crypto_map(&self, _store: &TemplateStore) -> Result<GetFilter> {
        Err(unsupported("get_crypto_map", self.vendor()))
    }

    /// RPC dropping uncommitted changes, when the vendor uses one instead
    /// of `<discard-changes/>`.
    fn discard_payload(&self, _store: &TemplateStore) -> Result<Option<DispatchPayload>> {
        Ok(None)
    }

    fn get_zones(&self, _store: &TemplateStore) -> Result<DispatchPayload> {
        Err(unsupported("get_zones", self.vendor()))
    }
}

/// The dialect for `vendor`.
pub fn dialect(vendor: Vendor) -> &'static dyn VendorDialect {
    match vendor {
        Vendor::IosXe => &IosXeDialect,
        Vendor::Junos => &JunosDialect,
    }
}

pub(crate) fn unsupported(operation: &str, vendor: Vendor) -> Error {
    SessionError::Unsupported {
        operation: operation.to_string(),
        vendor: vendor.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::VlanId;
    use crate::payload::Payload;
    use crate::payload::ns;
    use crate::xml::Element;

    fn store() -> TemplateStore {
        TemplateStore::open(concat!(env!("CARGO_MANIFEST_DIR"), "/templates")).unwrap()
    }

    #[test]
    fn test_every_payload_has_vendor_namespace() {
        let store = store();
        let vlan = Vlan::named(VlanId::new(10).unwrap(), "users");
        let ospf = OspfConfig::new("0.0.0.0").with_network("GigabitEthernet2", "10.1.0.0/24".parse().unwrap());

        for (vendor, hostname_ns, vlan_ns, ospf_ns) in [
            (Vendor::IosXe, ns::IOS_NATIVE, ns::IOS_NATIVE, ns::IOS_NATIVE),
            (Vendor::Junos, ns::OC_SYSTEM, ns::JUNOS_ROOT, ns::OC_NETWORK_INSTANCE),
        ] {
            let d = dialect(vendor);
            assert_eq!(d.vendor(), vendor);

            let cases = [
                (d.set_hostname(&store, "R1").unwrap().as_string(), hostname_ns),
                (d.get_hostname(&store).unwrap().as_string(), hostname_ns),
                (d.create_vlan(&store, &vlan).unwrap().as_string(), vlan_ns),
                (d.delete_vlan(&store, &vlan).unwrap().as_string(), vlan_ns),
                (d.get_vlans(&store).unwrap().as_string(), vlan_ns),
                (d.configure_ospf(&store, &ospf).unwrap().as_string(), ospf_ns),
                (d.get_interfaces(&store).unwrap().as_string(), ns::OC_INTERFACES),
            ];
            for (xml, expected) in cases {
                let root = Element::parse(&xml).unwrap();
                assert_eq!(root.namespace(), Some(expected), "{vendor}: {xml}");
            }
        }
    }

    #[test]
    fn test_vendor_specific_operations() {
        let store = store();
        assert!(dialect(Vendor::Junos).discard_payload(&store).unwrap().is_some());
        assert!(dialect(Vendor::IosXe).discard_payload(&store).unwrap().is_none());

        assert!(dialect(Vendor::Junos).get_zones(&store).is_ok());
        let err = dialect(Vendor::IosXe).get_zones(&store).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);

        assert!(dialect(Vendor::IosXe).get_crypto_map(&store).is_ok());
        assert!(dialect(Vendor::Junos).get_crypto_map(&store).is_err());
    }
}
