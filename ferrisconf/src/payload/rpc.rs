//! Junos RPCs sent through `dispatch`.

use super::{DispatchPayload, Draft};
use crate::error::Result;
use crate::template::{Action, TemplateStore};

const FAMILY: &str = "junos-rpc";

/// `<load-configuration rollback="0"/>`, dropping uncommitted candidate changes.
pub struct JunosRollback<'a> {
    store: &'a TemplateStore,
}

impl<'a> JunosRollback<'a> {
    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    pub fn payload(&self) -> Result<DispatchPayload> {
        let draft = Draft::load(self.store, FAMILY, Action::Dispatch, "rollback_pending_changes")?;
        Ok(DispatchPayload::new("discard", draft.finish()))
    }
}

/// `<get-zones-information/>`.
pub struct JunosZones<'a> {
    store: &'a TemplateStore,
}

impl<'a> JunosZones<'a> {
    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store }
    }

    pub fn payload(&self) -> Result<DispatchPayload> {
        let draft = Draft::load(self.store, FAMILY, Action::Dispatch, "get-zones")?;
        Ok(DispatchPayload::new("get_zones", draft.finish()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::test_support::store;
    use crate::payload::{Operation, Payload};

    #[test]
    fn test_rollback_zero() {
        let store = store();
        let payload = JunosRollback::new(&store).payload().unwrap();
        assert_eq!(payload.operation(), Operation::Dispatch);
        assert_eq!(payload.as_element().name(), "load-configuration");
        assert_eq!(payload.as_element().attribute("rollback"), Some("0"));
    }

    #[test]
    fn test_zones() {
        let store = store();
        let payload = JunosZones::new(&store).payload().unwrap();
        assert_eq!(payload.as_string(), "<get-zones-information/>");
    }
}
