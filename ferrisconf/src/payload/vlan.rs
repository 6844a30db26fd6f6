//! VLAN builders for IOS-XE native and Junos configuration models.

use super::{Draft, EditConfigFilter, GetFilter, mark_delete};
use crate::error::Result;
use crate::model::{Vlan, VlanId};
use crate::template::{Action, TemplateStore};

/// `Cisco-IOS-XE-native` / `Cisco-IOS-XE-vlan` VLAN list.
pub struct NativeVlan<'a> {
    store: &'a TemplateStore,
}

impl<'a> NativeVlan<'a> {
    pub const FAMILY: &'static str = "Cisco-IOS-XE-native";

    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Result<GetFilter> {
        let draft = Draft::load(self.store, Self::FAMILY, Action::Get, "vlans")?;
        Ok(GetFilter::new("get_vlans", draft.finish()))
    }

    pub fn create(&self, vlan: &Vlan) -> Result<EditConfigFilter> {
        let mut draft = Draft::load(self.store, Self::FAMILY, Action::EditConfig, "create-vlan")?;
        draft.set("ios:vlan/vlan:vlan-list/vlan:id", vlan.id.to_string())?;
        match &vlan.name {
            Some(name) => draft.set("ios:vlan/vlan:vlan-list/vlan:name", name.as_str())?,
            None => draft.remove("ios:vlan/vlan:vlan-list/vlan:name")?,
        }
        Ok(EditConfigFilter::new("create_vlan", draft.finish()))
    }

    pub fn delete(&self, id: VlanId) -> Result<EditConfigFilter> {
        let mut draft = Draft::load(self.store, Self::FAMILY, Action::EditConfig, "create-vlan")?;
        draft.set("ios:vlan/vlan:vlan-list/vlan:id", id.to_string())?;
        draft.remove("ios:vlan/vlan:vlan-list/vlan:name")?;
        mark_delete(draft.at("ios:vlan/vlan:vlan-list")?);
        Ok(EditConfigFilter::new("delete_vlan", draft.finish()))
    }
}

/// `junos-conf-root` VLANs, keyed by name.
pub struct JunosVlan<'a> {
    store: &'a TemplateStore,
}

impl<'a> JunosVlan<'a> {
    pub const FAMILY: &'static str = "junos-conf-root";

    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Result<GetFilter> {
        let draft = Draft::load(self.store, Self::FAMILY, Action::Get, "vlans")?;
        Ok(GetFilter::new("get_vlans", draft.finish()))
    }

    pub fn create(&self, vlan: &Vlan) -> Result<EditConfigFilter> {
        let mut draft = Draft::load(self.store, Self::FAMILY, Action::EditConfig, "create-vlan")?;
        draft.set("j-vlans:vlans/j-vlans:vlan/j-vlans:name", vlan.name_or_default())?;
        draft.set("j-vlans:vlans/j-vlans:vlan/j-vlans:vlan-id", vlan.id.to_string())?;
        Ok(EditConfigFilter::new("create_vlan", draft.finish()))
    }

    /// Delete by name; the id is not a key in the Junos model.
    pub fn delete(&self, vlan: &Vlan) -> Result<EditConfigFilter> {
        let mut draft = Draft::load(self.store, Self::FAMILY, Action::EditConfig, "create-vlan")?;
        draft.set("j-vlans:vlans/j-vlans:vlan/j-vlans:name", vlan.name_or_default())?;
        draft.remove("j-vlans:vlans/j-vlans:vlan/j-vlans:vlan-id")?;
        mark_delete(draft.at("j-vlans:vlans/j-vlans:vlan")?);
        Ok(EditConfigFilter::new("delete_vlan", draft.finish()))
    }
}
