//! Hostname builders.

use std::sync::LazyLock;

use regex::Regex;

use super::{Draft, EditConfigFilter, GetFilter};
use crate::error::{Error, Result};
use crate::template::{Action, TemplateStore};

/// Check a hostname against RFC 1123 label rules.
pub fn validate_hostname(hostname: &str) -> Result<()> {
    static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9_-]{0,61}[A-Za-z0-9])?$").expect("static regex")
    });

    if HOSTNAME.is_match(hostname) {
        Ok(())
    } else {
        Err(Error::invalid(format!("invalid hostname '{}'", hostname)))
    }
}

/// `Cisco-IOS-XE-native` hostname.
pub struct NativeHostname<'a> {
    store: &'a TemplateStore,
}

impl<'a> NativeHostname<'a> {
    pub const FAMILY: &'static str = "Cisco-IOS-XE-native";

    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Result<GetFilter> {
        let draft = Draft::load(self.store, Self::FAMILY, Action::Get, "hostname")?;
        Ok(GetFilter::new("get_hostname", draft.finish()))
    }

    pub fn set(&self, hostname: &str) -> Result<EditConfigFilter> {
        validate_hostname(hostname)?;
        let mut draft = Draft::load(self.store, Self::FAMILY, Action::EditConfig, "set-hostname")?;
        draft.set("ios:hostname", hostname)?;
        Ok(EditConfigFilter::new("set_hostname", draft.finish()))
    }
}

/// `openconfig-system` hostname.
pub struct OpenConfigHostname<'a> {
    store: &'a TemplateStore,
}

impl<'a> OpenConfigHostname<'a> {
    pub const FAMILY: &'static str = "openconfig-system";

    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    pub fn get(&self) -> Result<GetFilter> {
        let draft = Draft::load(self.store, Self::FAMILY, Action::Get, "hostname")?;
        Ok(GetFilter::new("get_hostname", draft.finish()))
    }

    pub fn set(&self, hostname: &str) -> Result<EditConfigFilter> {
        validate_hostname(hostname)?;
        let mut draft = Draft::load(self.store, Self::FAMILY, Action::EditConfig, "set-hostname")?;
        draft.set("oc-sys:config/oc-sys:hostname", hostname)?;
        Ok(EditConfigFilter::new("set_hostname", draft.finish()))
    }
}
