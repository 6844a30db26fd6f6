//! Device identity, vendor tag and server capabilities.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Stable identifier of a managed device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Device vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Cisco IOS-XE
    IosXe,
    /// Juniper Junos
    Junos,
}

impl Vendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::IosXe => "iosxe",
            Vendor::Junos => "junos",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iosxe" | "ios-xe" | "cisco_iosxe" => Ok(Vendor::IosXe),
            "junos" | "juniper" | "juniper_junos" => Ok(Vendor::Junos),
            _ => Err(Error::invalid(format!("unknown vendor '{}'", s))),
        }
    }
}

/// Well-known NETCONF capability names, without the URN prefix and version.
pub mod capability {
    pub const CANDIDATE: &str = "candidate";
    pub const WRITABLE_RUNNING: &str = "writable-running";
    pub const STARTUP: &str = "startup";
    pub const CONFIRMED_COMMIT: &str = "confirmed-commit";
    pub const ROLLBACK_ON_ERROR: &str = "rollback-on-error";
    pub const VALIDATE: &str = "validate";

    /// Prefix shared by the IETF capability URNs.
    pub const URN_PREFIX: &str = "urn:ietf:params:netconf:capability:";

    /// Full 1.0 URN of a short capability name.
    pub fn urn(name: &str) -> String {
        format!("{}{}:1.0", URN_PREFIX, name)
    }
}

/// Ordered set of capability URIs advertised by a server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(IndexSet<String>);

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a capability URI is present. Any `?query` suffix is ignored.
    pub fn contains(&self, uri: &str) -> bool {
        self.0.iter().any(|c| base_uri(c) == base_uri(uri))
    }

    /// Whether the short IETF capability `name` is advertised in any version.
    pub fn supports(&self, name: &str) -> bool {
        self.0.iter().any(|c| {
            base_uri(c)
                .strip_prefix(capability::URN_PREFIX)
                .and_then(|rest| rest.strip_prefix(name))
                .is_some_and(|rest| rest.starts_with(':'))
        })
    }

    pub fn supports_candidate(&self) -> bool {
        self.supports(capability::CANDIDATE)
    }

    pub fn supports_writable_running(&self) -> bool {
        self.supports(capability::WRITABLE_RUNNING)
    }

    pub fn supports_confirmed_commit(&self) -> bool {
        self.supports(capability::CONFIRMED_COMMIT)
    }

    pub fn supports_rollback_on_error(&self) -> bool {
        self.supports(capability::ROLLBACK_ON_ERROR)
    }

    pub fn supports_validate(&self) -> bool {
        self.supports(capability::VALIDATE)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Capabilities {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

fn base_uri(uri: &str) -> &str {
    uri.split_once('?').map_or(uri, |(base, _)| base).trim()
}
