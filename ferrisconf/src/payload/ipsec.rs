//! Site-to-site IPSec builders.
//!
//! The IOS-XE payload is assembled section by section in the order the
//! device resolves references: ACL, transform-set, ISAKMP key and policy,
//! crypto map, then the interface binding. The crypto map refers to the
//! ACL name and transform-set tag captured by the earlier sections.

use std::net::Ipv4Addr;

use secrecy::ExposeSecret;

use super::{Draft, EditConfigFilter, GetFilter, child_of, push_container, push_leaf, split_interface_name};
use crate::error::{Error, Result};
use crate::model::{Encryption, IkeParameters, IpsecParameters, PeerParameters};
use crate::payload::ns;
use crate::template::{Action, TemplateStore};
use crate::xml::Element;

fn wildcard(mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(!u32::from(mask))
}

/// Values produced by one section and consumed by a later one.
#[derive(Debug, Default)]
struct Captured {
    acl_name: Option<String>,
    transform_set: Option<String>,
}

/// `Cisco-IOS-XE-native` crypto configuration.
pub struct NativeIpsec<'a> {
    store: &'a TemplateStore,
}

impl<'a> NativeIpsec<'a> {
    pub const FAMILY: &'static str = "Cisco-IOS-XE-native";

    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    /// Filter reading back ISAKMP policies and crypto maps.
    pub fn get(&self) -> Result<GetFilter> {
        let draft = Draft::load(self.store, Self::FAMILY, Action::Get, "crypto-map")?;
        Ok(GetFilter::new("get_crypto_map", draft.finish()))
    }

    pub fn configure(
        &self,
        peer: &PeerParameters,
        ike: &IkeParameters,
        ipsec: &IpsecParameters,
    ) -> Result<EditConfigFilter> {
        peer.validate()?;
        ike.validate()?;
        ipsec.validate()?;
        let (wan_kind, wan_number) = split_interface_name(&peer.wan_interface)?;

        let mut draft = Draft::load(self.store, Self::FAMILY, Action::EditConfig, "configure-ipsec")?;
        let mut captured = Captured::default();

        Self::access_list(&mut draft, peer, &mut captured)?;
        Self::transform_set(&mut draft, ipsec, &mut captured)?;
        Self::isakmp(&mut draft, peer, ike)?;
        Self::crypto_map(&mut draft, peer, ipsec, &captured)?;
        Self::interface(&mut draft, peer, wan_kind, wan_number)?;

        Ok(EditConfigFilter::new("configure_ipsec", draft.finish()))
    }

    fn access_list(draft: &mut Draft, peer: &PeerParameters, captured: &mut Captured) -> Result<()> {
        const ACL: &str = "ios:ip/ios:access-list/acl:extended";
        const RULE: &str = "ios:ip/ios:access-list/acl:extended/acl:access-list-seq-rule/acl:ace-rule";

        let name = peer.ios_xe.acl_number.to_string();
        draft.set(&format!("{ACL}/acl:name"), name.as_str())?;
        draft.set(
            &format!("{RULE}/acl:ipv4-address"),
            peer.local_network.network().to_string(),
        )?;
        draft.set(
            &format!("{RULE}/acl:mask"),
            wildcard(peer.local_network.mask()).to_string(),
        )?;
        draft.set(
            &format!("{RULE}/acl:dest-ipv4-address"),
            peer.remote_network.network().to_string(),
        )?;
        draft.set(
            &format!("{RULE}/acl:dest-mask"),
            wildcard(peer.remote_network.mask()).to_string(),
        )?;

        captured.acl_name = Some(name);
        Ok(())
    }

    fn transform_set(draft: &mut Draft, ipsec: &IpsecParameters, captured: &mut Captured) -> Result<()> {
        const SET: &str = "ios:crypto/crypto:ipsec/crypto:transform-set";

        let tag = ipsec.transform_set_tag();
        draft.set(&format!("{SET}/crypto:tag"), tag.as_str())?;
        draft.set(&format!("{SET}/crypto:esp"), ipsec.encryption.ios_xe_esp())?;
        draft.set(&format!("{SET}/crypto:esp-hmac"), ipsec.integrity.ios_xe_name())?;

        if let Some(bits) = ipsec.encryption.aes_key_bits() {
            let set = draft.at(SET)?;
            let key_bit = child_of(set, "key-bit").with_text(bits.to_string());
            let after_esp = set
                .children()
                .iter()
                .position(|c| c.name() == "esp")
                .map_or(set.children().len(), |i| i + 1);
            set.children_mut().insert(after_esp, key_bit);
        }

        captured.transform_set = Some(tag);
        Ok(())
    }

    fn isakmp(draft: &mut Draft, peer: &PeerParameters, ike: &IkeParameters) -> Result<()> {
        const KEY: &str = "ios:crypto/crypto:isakmp/crypto:key/crypto:key-address";
        const POLICY: &str = "ios:crypto/crypto:isakmp/crypto:policy";

        draft.set(&format!("{KEY}/crypto:ipv4-addr"), peer.remote_peer.to_string())?;
        draft.set(&format!("{KEY}/crypto:key"), ike.psk.expose_secret())?;

        draft.set(&format!("{POLICY}/crypto:number"), peer.ios_xe.isakmp_policy.to_string())?;
        draft.set(&format!("{POLICY}/crypto:group"), ike.dh_group.number().to_string())?;
        draft.set(&format!("{POLICY}/crypto:hash"), ike.hash.ios_xe_name())?;
        draft.set(&format!("{POLICY}/crypto:lifetime"), ike.lifetime_secs.to_string())?;

        let encryption = draft.at(&format!("{POLICY}/crypto:encryption"))?;
        match ike.encryption {
            Encryption::Des3 => {
                push_container(encryption, "three-des");
            }
            aes => {
                let aes_el = push_container(encryption, "aes");
                if let Some(bits) = aes.aes_key_bits() {
                    push_leaf(aes_el, "key", bits.to_string());
                }
            }
        }
        Ok(())
    }

    fn crypto_map(
        draft: &mut Draft,
        peer: &PeerParameters,
        ipsec: &IpsecParameters,
        captured: &Captured,
    ) -> Result<()> {
        const MAP: &str = "ios:crypto/crypto:map";

        let acl = captured
            .acl_name
            .as_deref()
            .ok_or_else(|| Error::invalid("crypto map built before its access list"))?;
        let transform_set = captured
            .transform_set
            .as_deref()
            .ok_or_else(|| Error::invalid("crypto map built before its transform-set"))?;

        draft.set(&format!("{MAP}/crypto:tag"), peer.ios_xe.crypto_map.as_str())?;
        draft.set(&format!("{MAP}/crypto:seq"), peer.ios_xe.crypto_map_seq.to_string())?;
        draft.set(&format!("{MAP}/crypto:match/crypto:address"), acl)?;
        draft.set(
            &format!("{MAP}/crypto:set/crypto:peer/crypto:address"),
            peer.remote_peer.to_string(),
        )?;
        draft.set(&format!("{MAP}/crypto:set/crypto:transform-set"), transform_set)?;
        draft.set(
            &format!("{MAP}/crypto:set/crypto:security-association/crypto:lifetime/crypto:seconds"),
            ipsec.lifetime_secs.to_string(),
        )?;
        Ok(())
    }

    fn interface(draft: &mut Draft, peer: &PeerParameters, kind: &str, number: &str) -> Result<()> {
        let container = draft.at("ios:interface")?;
        let entry = push_container(container, kind);
        push_leaf(entry, "name", number);
        let crypto = push_container(entry, "crypto");
        let map = crypto.push(Element::in_namespace(ns::IOS_CRYPTO, "map"));
        push_leaf(map, "tag", peer.ios_xe.crypto_map.as_str());
        Ok(())
    }
}

/// `junos-conf-root` route-based VPN on a secure tunnel interface.
pub struct JunosIpsec<'a> {
    store: &'a TemplateStore,
}

impl<'a> JunosIpsec<'a> {
    pub const FAMILY: &'static str = "junos-conf-root";

    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    pub fn configure(
        &self,
        peer: &PeerParameters,
        ike: &IkeParameters,
        ipsec: &IpsecParameters,
    ) -> Result<EditConfigFilter> {
        peer.validate()?;
        ike.validate()?;
        ipsec.validate()?;

        let tunnel = peer.junos.tunnel_interface.as_str();
        let (tunnel_name, tunnel_unit) = tunnel.split_once('.').unwrap_or((tunnel, "0"));
        let suffix = peer.remote_peer.to_string();
        let ike_proposal = format!("ike-proposal-{suffix}");
        let ike_policy = format!("ike-policy-{suffix}");
        let gateway = format!("gw-{suffix}");
        let ipsec_proposal = format!("ipsec-proposal-{}", ipsec.transform_set_tag());
        let ipsec_policy = format!("ipsec-policy-{suffix}");
        let vpn = format!("vpn-{suffix}");

        let mut draft = Draft::load(self.store, Self::FAMILY, Action::EditConfig, "configure-ipsec")?;

        const IKE: &str = "j-sec:security/j-sec:ike";
        draft.set(&format!("{IKE}/j-sec:proposal/j-sec:name"), ike_proposal.as_str())?;
        draft.set(&format!("{IKE}/j-sec:proposal/j-sec:dh-group"), ike.dh_group.to_string())?;
        draft.set(
            &format!("{IKE}/j-sec:proposal/j-sec:authentication-algorithm"),
            ike.hash.junos_name(),
        )?;
        draft.set(
            &format!("{IKE}/j-sec:proposal/j-sec:encryption-algorithm"),
            ike.encryption.junos_name(),
        )?;
        draft.set(
            &format!("{IKE}/j-sec:proposal/j-sec:lifetime-seconds"),
            ike.lifetime_secs.to_string(),
        )?;
        draft.set(&format!("{IKE}/j-sec:policy/j-sec:name"), ike_policy.as_str())?;
        draft.set(&format!("{IKE}/j-sec:policy/j-sec:proposals"), ike_proposal.as_str())?;
        draft.set(
            &format!("{IKE}/j-sec:policy/j-sec:pre-shared-key/j-sec:ascii-text"),
            ike.psk.expose_secret(),
        )?;
        draft.set(&format!("{IKE}/j-sec:gateway/j-sec:name"), gateway.as_str())?;
        draft.set(&format!("{IKE}/j-sec:gateway/j-sec:ike-policy"), ike_policy.as_str())?;
        draft.set(&format!("{IKE}/j-sec:gateway/j-sec:address"), suffix.as_str())?;
        draft.set(
            &format!("{IKE}/j-sec:gateway/j-sec:external-interface"),
            peer.wan_interface.as_str(),
        )?;

        const IPSEC: &str = "j-sec:security/j-sec:ipsec";
        draft.set(&format!("{IPSEC}/j-sec:proposal/j-sec:name"), ipsec_proposal.as_str())?;
        draft.set(
            &format!("{IPSEC}/j-sec:proposal/j-sec:authentication-algorithm"),
            ipsec.integrity.junos_name(),
        )?;
        draft.set(
            &format!("{IPSEC}/j-sec:proposal/j-sec:encryption-algorithm"),
            ipsec.encryption.junos_name(),
        )?;
        draft.set(
            &format!("{IPSEC}/j-sec:proposal/j-sec:lifetime-seconds"),
            ipsec.lifetime_secs.to_string(),
        )?;
        draft.set(&format!("{IPSEC}/j-sec:policy/j-sec:name"), ipsec_policy.as_str())?;
        draft.set(&format!("{IPSEC}/j-sec:policy/j-sec:proposals"), ipsec_proposal.as_str())?;
        draft.set(&format!("{IPSEC}/j-sec:vpn/j-sec:name"), vpn.as_str())?;
        draft.set(&format!("{IPSEC}/j-sec:vpn/j-sec:bind-interface"), tunnel)?;
        draft.set(&format!("{IPSEC}/j-sec:vpn/j-sec:ike/j-sec:gateway"), gateway.as_str())?;
        draft.set(
            &format!("{IPSEC}/j-sec:vpn/j-sec:ike/j-sec:ipsec-policy"),
            ipsec_policy.as_str(),
        )?;

        draft.set("j-if:interfaces/j-if:interface/j-if:name", tunnel_name)?;
        draft.set("j-if:interfaces/j-if:interface/j-if:unit/j-if:name", tunnel_unit)?;

        draft.set(
            "j-ro:routing-options/j-ro:static/j-ro:route/j-ro:name",
            peer.remote_network.to_string(),
        )?;
        draft.set("j-ro:routing-options/j-ro:static/j-ro:route/j-ro:next-hop", tunnel)?;

        Ok(EditConfigFilter::new("configure_ipsec", draft.finish()))
    }
}
