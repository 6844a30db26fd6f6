//! Site-to-site IPSec parameter records.
//!
//! Algorithm names are parsed from the strings operators type into the
//! dialogs (`sha1`, `sha-hmac`, `aes-128`, `group14`, ...) and rendered
//! per vendor.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnetwork::Ipv4Network;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{Error, Result};

/// IKE (phase 1) hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IkeHash {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl IkeHash {
    /// IOS-XE `crypto isakmp policy` hash keyword.
    pub fn ios_xe_name(&self) -> &'static str {
        match self {
            IkeHash::Md5 => "md5",
            IkeHash::Sha1 => "sha",
            IkeHash::Sha256 => "sha256",
            IkeHash::Sha384 => "sha384",
            IkeHash::Sha512 => "sha512",
        }
    }

    /// Junos `authentication-algorithm` of an IKE proposal.
    pub fn junos_name(&self) -> &'static str {
        match self {
            IkeHash::Md5 => "md5",
            IkeHash::Sha1 => "sha1",
            IkeHash::Sha256 => "sha-256",
            IkeHash::Sha384 => "sha-384",
            IkeHash::Sha512 => "sha-512",
        }
    }
}

impl FromStr for IkeHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(IkeHash::Md5),
            "sha" | "sha1" => Ok(IkeHash::Sha1),
            "sha256" | "sha-256" => Ok(IkeHash::Sha256),
            "sha384" | "sha-384" => Ok(IkeHash::Sha384),
            "sha512" | "sha-512" => Ok(IkeHash::Sha512),
            _ => Err(Error::invalid(format!("unknown IKE hash '{}'", s))),
        }
    }
}

/// Symmetric cipher, shared by IKE and ESP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encryption {
    Des3,
    Aes128,
    Aes192,
    Aes256,
}

impl Encryption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encryption::Des3 => "3des",
            Encryption::Aes128 => "aes-128",
            Encryption::Aes192 => "aes-192",
            Encryption::Aes256 => "aes-256",
        }
    }

    /// AES key length in bits.
    pub fn aes_key_bits(&self) -> Option<u16> {
        match self {
            Encryption::Des3 => None,
            Encryption::Aes128 => Some(128),
            Encryption::Aes192 => Some(192),
            Encryption::Aes256 => Some(256),
        }
    }

    /// IOS-XE transform-set ESP cipher keyword.
    pub fn ios_xe_esp(&self) -> &'static str {
        match self {
            Encryption::Des3 => "esp-3des",
            _ => "esp-aes",
        }
    }

    /// Junos `encryption-algorithm`.
    pub fn junos_name(&self) -> &'static str {
        match self {
            Encryption::Des3 => "3des-cbc",
            Encryption::Aes128 => "aes-128-cbc",
            Encryption::Aes192 => "aes-192-cbc",
            Encryption::Aes256 => "aes-256-cbc",
        }
    }
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encryption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "3des" | "des3" => Ok(Encryption::Des3),
            "aes" | "aes128" | "aes-128" => Ok(Encryption::Aes128),
            "aes192" | "aes-192" => Ok(Encryption::Aes192),
            "aes256" | "aes-256" => Ok(Encryption::Aes256),
            _ => Err(Error::invalid(format!("unknown encryption '{}'", s))),
        }
    }
}

/// ESP integrity (phase 2 authentication).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EspIntegrity {
    Md5Hmac,
    ShaHmac,
    Sha256Hmac,
    Sha384Hmac,
    Sha512Hmac,
}

impl EspIntegrity {
    pub fn as_str(&self) -> &'static str {
        match self {
            EspIntegrity::Md5Hmac => "md5-hmac",
            EspIntegrity::ShaHmac => "sha-hmac",
            EspIntegrity::Sha256Hmac => "sha256-hmac",
            EspIntegrity::Sha384Hmac => "sha384-hmac",
            EspIntegrity::Sha512Hmac => "sha512-hmac",
        }
    }

    /// IOS-XE transform-set `esp-hmac` keyword.
    pub fn ios_xe_name(&self) -> String {
        format!("esp-{}", self.as_str())
    }

    /// Junos IPSec proposal `authentication-algorithm`.
    pub fn junos_name(&self) -> &'static str {
        match self {
            EspIntegrity::Md5Hmac => "hmac-md5-96",
            EspIntegrity::ShaHmac => "hmac-sha1-96",
            EspIntegrity::Sha256Hmac => "hmac-sha-256-128",
            EspIntegrity::Sha384Hmac => "hmac-sha-384",
            EspIntegrity::Sha512Hmac => "hmac-sha-512",
        }
    }
}

impl fmt::Display for EspIntegrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EspIntegrity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        match lower.strip_prefix("esp-").unwrap_or(&lower) {
            "md5-hmac" => Ok(EspIntegrity::Md5Hmac),
            "sha-hmac" | "sha1-hmac" => Ok(EspIntegrity::ShaHmac),
            "sha256-hmac" => Ok(EspIntegrity::Sha256Hmac),
            "sha384-hmac" => Ok(EspIntegrity::Sha384Hmac),
            "sha512-hmac" => Ok(EspIntegrity::Sha512Hmac),
            _ => Err(Error::invalid(format!("unknown ESP integrity '{}'", s))),
        }
    }
}

/// Diffie-Hellman group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DhGroup(u8);

impl DhGroup {
    const SUPPORTED: [u8; 10] = [1, 2, 5, 14, 15, 16, 19, 20, 21, 24];

    pub fn new(group: u8) -> Result<Self> {
        if Self::SUPPORTED.contains(&group) {
            Ok(Self(group))
        } else {
            Err(Error::invalid(format!("unsupported DH group {}", group)))
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for DhGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group{}", self.0)
    }
}

impl FromStr for DhGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        let digits = lower.strip_prefix("group").unwrap_or(&lower);
        let group = digits
            .parse::<u8>()
            .map_err(|_| Error::invalid(format!("unknown DH group '{}'", s)))?;
        Self::new(group)
    }
}

/// IKE lifetime bounds in seconds.
pub const IKE_LIFETIME_RANGE: std::ops::RangeInclusive<u32> = 60..=86_400;

/// IPSec SA lifetime bounds in seconds.
pub const IPSEC_LIFETIME_RANGE: std::ops::RangeInclusive<u32> = 120..=86_400;

/// Extended ACL numbers usable for the crypto ACL.
pub const ACL_RANGE: std::ops::RangeInclusive<u16> = 100..=199;

/// Phase 1 parameters.
#[derive(Debug)]
pub struct IkeParameters {
    pub hash: IkeHash,
    pub encryption: Encryption,
    pub dh_group: DhGroup,
    pub lifetime_secs: u32,
    pub psk: SecretString,
}

impl IkeParameters {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.psk.expose_secret().trim().is_empty() {
            return Err(Error::invalid("pre-shared key must not be empty"));
        }
        if !IKE_LIFETIME_RANGE.contains(&self.lifetime_secs) {
            return Err(Error::invalid(format!(
                "IKE lifetime {}s is outside {}-{}",
                self.lifetime_secs,
                IKE_LIFETIME_RANGE.start(),
                IKE_LIFETIME_RANGE.end()
            )));
        }
        Ok(())
    }
}

/// Phase 2 parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpsecParameters {
    pub integrity: EspIntegrity,
    pub encryption: Encryption,
    pub lifetime_secs: u32,
}

impl IpsecParameters {
    /// Transform-set tag: `{auth}_{enc}` with dashes turned into underscores.
    pub fn transform_set_tag(&self) -> String {
        format!("{}_{}", self.integrity, self.encryption).replace('-', "_")
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !IPSEC_LIFETIME_RANGE.contains(&self.lifetime_secs) {
            return Err(Error::invalid(format!(
                "IPSec lifetime {}s is outside {}-{}",
                self.lifetime_secs,
                IPSEC_LIFETIME_RANGE.start(),
                IPSEC_LIFETIME_RANGE.end()
            )));
        }
        Ok(())
    }
}

/// IOS-XE specific knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IosXeIpsecOptions {
    pub acl_number: u16,
    pub isakmp_policy: u16,
    pub crypto_map: String,
    pub crypto_map_seq: u16,
}

impl Default for IosXeIpsecOptions {
    fn default() -> Self {
        Self {
            acl_number: 100,
            isakmp_policy: 1,
            crypto_map: "netconf_cm".to_string(),
            crypto_map_seq: 1,
        }
    }
}

/// Junos specific knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunosIpsecOptions {
    /// Secure tunnel interface the VPN binds to.
    pub tunnel_interface: String,
}

impl Default for JunosIpsecOptions {
    fn default() -> Self {
        Self {
            tunnel_interface: "st0.0".to_string(),
        }
    }
}

/// One end of a site-to-site tunnel, seen from the device being configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerParameters {
    pub lan_interface: String,
    pub wan_interface: String,
    pub local_network: Ipv4Network,
    pub remote_network: Ipv4Network,
    pub local_peer: Ipv4Addr,
    pub remote_peer: Ipv4Addr,
    pub ios_xe: IosXeIpsecOptions,
    pub junos: JunosIpsecOptions,
}

impl PeerParameters {
    /// Whether `other` describes the far end of the same tunnel.
    pub fn mirrors(&self, other: &PeerParameters) -> bool {
        self.local_network == other.remote_network
            && self.remote_network == other.local_network
            && self.local_peer == other.remote_peer
            && self.remote_peer == other.local_peer
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.lan_interface.trim().is_empty() || self.wan_interface.trim().is_empty() {
            return Err(Error::invalid("LAN and WAN interfaces are required"));
        }
        if self.local_peer == self.remote_peer {
            return Err(Error::invalid(format!(
                "local and remote peer are both {}",
                self.local_peer
            )));
        }
        if !ACL_RANGE.contains(&self.ios_xe.acl_number) {
            return Err(Error::invalid(format!(
                "ACL number {} is outside {}-{}",
                self.ios_xe.acl_number,
                ACL_RANGE.start(),
                ACL_RANGE.end()
            )));
        }
        if self.ios_xe.isakmp_policy == 0 || self.ios_xe.crypto_map_seq == 0 {
            return Err(Error::invalid(
                "ISAKMP policy and crypto map sequence must be at least 1",
            ));
        }
        if self.ios_xe.crypto_map.trim().is_empty() {
            return Err(Error::invalid("crypto map name is required"));
        }
        if self.junos.tunnel_interface.trim().is_empty() {
            return Err(Error::invalid("tunnel interface is required"));
        }
        Ok(())
    }
}
