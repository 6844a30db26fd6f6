//! Pending-change ledger.
//!
//! Every successful `edit-config` is recorded here against its device
//! until a commit or discard settles it. Observers subscribe to one event
//! kind and are called synchronously, after the ledger lock is released,
//! so a handler may read the ledger again.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::DeviceId;

/// Lifecycle of a recorded change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Pending,
    Committed,
    Discarded,
}

/// One recorded `edit-config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub device: DeviceId,
    /// User-level operation name (`set_hostname`, `configure_ospf`, ...).
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub request: String,
    pub reply: String,
    pub status: ChangeStatus,
}

/// Ledger notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    PendingChangeAdded {
        device: DeviceId,
        name: String,
        request: String,
        reply: String,
    },
    PendingChangeRemoved {
        device: DeviceId,
        name: String,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            LedgerEvent::PendingChangeAdded { .. } => EventKind::PendingChangeAdded,
            LedgerEvent::PendingChangeRemoved { .. } => EventKind::PendingChangeRemoved,
        }
    }
}

/// Event kinds observers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PendingChangeAdded,
    PendingChangeRemoved,
}

/// Handle returned by [`Ledger::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
    kind: EventKind,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

type Handler = Arc<dyn Fn(&LedgerEvent) + Send + Sync>;

#[derive(Default)]
struct Inner {
    entries: IndexMap<DeviceId, Vec<PendingChange>>,
    subscribers: Vec<(Subscription, Handler)>,
    next_subscription: u64,
}

/// Per-device record of uncommitted operations.
#[derive(Default)]
pub struct Ledger {
    inner: Mutex<Inner>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Ledger")
            .field("devices", &inner.entries.len())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&LedgerEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.lock();
        let subscription = Subscription {
            id: inner.next_subscription,
            kind,
        };
        inner.next_subscription += 1;
        inner.subscribers.push((subscription, Arc::new(handler)));
        subscription
    }

    /// Remove a subscription. Returns whether it was registered.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut inner = self.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(s, _)| *s != subscription);
        inner.subscribers.len() != before
    }

    /// Record a successful edit as pending and notify observers.
    pub fn record(
        &self,
        device: &DeviceId,
        name: impl Into<String>,
        request: impl Into<String>,
        reply: impl Into<String>,
    ) -> PendingChange {
        let change = PendingChange {
            device: device.clone(),
            name: name.into(),
            timestamp: Utc::now(),
            request: request.into(),
            reply: reply.into(),
            status: ChangeStatus::Pending,
        };
        let event = LedgerEvent::PendingChangeAdded {
            device: change.device.clone(),
            name: change.name.clone(),
            request: change.request.clone(),
            reply: change.reply.clone(),
        };

        let handlers = {
            let mut inner = self.lock();
            inner.entries.entry(device.clone()).or_default().push(change.clone());
            Self::handlers(&inner, EventKind::PendingChangeAdded)
        };
        debug!("{}: pending change '{}' recorded", device, change.name);
        deliver(&handlers, &event);
        change
    }

    /// Mark every pending entry of `device` committed. Returns how many.
    pub fn mark_committed(&self, device: &DeviceId) -> usize {
        self.settle(device, ChangeStatus::Committed)
    }

    /// Mark every pending entry of `device` discarded. Returns how many.
    pub fn mark_discarded(&self, device: &DeviceId) -> usize {
        self.settle(device, ChangeStatus::Discarded)
    }

    /// Pending entries of `device`, oldest first.
    pub fn list_pending(&self, device: &DeviceId) -> Vec<PendingChange> {
        self.lock()
            .entries
            .get(device)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|c| c.status == ChangeStatus::Pending)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every entry of `device` regardless of status.
    pub fn entries(&self, device: &DeviceId) -> Vec<PendingChange> {
        self.lock().entries.get(device).cloned().unwrap_or_default()
    }

    fn settle(&self, device: &DeviceId, status: ChangeStatus) -> usize {
        let (names, handlers) = {
            let mut inner = self.lock();
            let names: Vec<String> = inner
                .entries
                .get_mut(device)
                .map(|entries| {
                    entries
                        .iter_mut()
                        .filter(|c| c.status == ChangeStatus::Pending)
                        .map(|c| {
                            c.status = status;
                            c.name.clone()
                        })
                        .collect()
                })
                .unwrap_or_default();
            (names, Self::handlers(&inner, EventKind::PendingChangeRemoved))
        };

        if !names.is_empty() {
            debug!("{}: {} pending change(s) now {:?}", device, names.len(), status);
        }
        for name in &names {
            let event = LedgerEvent::PendingChangeRemoved {
                device: device.clone(),
                name: name.clone(),
            };
            deliver(&handlers, &event);
        }
        names.len()
    }

    fn handlers(inner: &Inner, kind: EventKind) -> Vec<Handler> {
        inner
            .subscribers
            .iter()
            .filter(|(s, _)| s.kind == kind)
            .map(|(_, h)| Arc::clone(h))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn deliver(handlers: &[Handler], event: &LedgerEvent) {
    for handler in handlers {
        handler(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_record_and_settle() {
        let ledger = Ledger::new();
        let r1 = DeviceId::new("r1");
        let r2 = DeviceId::new("r2");
        ledger.record(&r1, "set_hostname", "<req/>", "<ok/>");
        ledger.record(&r1, "configure_ospf", "<req/>", "<ok/>");
        ledger.record(&r2, "create_vlan", "<req/>", "<ok/>");

        assert_eq!(ledger.list_pending(&r1).len(), 2);
        assert_eq!(ledger.list_pending(&r1)[0].name, "set_hostname");

        assert_eq!(ledger.mark_committed(&r1), 2);
        assert!(ledger.list_pending(&r1).is_empty());
        assert_eq!(ledger.entries(&r1).len(), 2);
        assert_eq!(ledger.entries(&r1)[1].status, ChangeStatus::Committed);

        assert_eq!(ledger.mark_discarded(&r2), 1);
        assert_eq!(ledger.mark_discarded(&r2), 0);
        assert!(ledger.entries(&DeviceId::new("r3")).is_empty());
    }

    #[test]
    fn test_events_per_kind() {
        let ledger = Ledger::new();
        let added = Arc::new(AtomicUsize::new(0));
        let removed = Arc::new(AtomicUsize::new(0));

        let a = added.clone();
        let sub = ledger.subscribe(EventKind::PendingChangeAdded, move |event| {
            assert_eq!(event.kind(), EventKind::PendingChangeAdded);
            a.fetch_add(1, Ordering::SeqCst);
        });
        let r = removed.clone();
        ledger.subscribe(EventKind::PendingChangeRemoved, move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        });

        let r1 = DeviceId::new("r1");
        ledger.record(&r1, "a", "", "");
        ledger.record(&r1, "b", "", "");
        ledger.mark_committed(&r1);
        assert_eq!(added.load(Ordering::SeqCst), 2);
        assert_eq!(removed.load(Ordering::SeqCst), 2);

        assert!(ledger.unsubscribe(sub));
        assert!(!ledger.unsubscribe(sub));
        ledger.record(&r1, "c", "", "");
        assert_eq!(added.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_handler_can_reenter_ledger() {
        let ledger = Arc::new(Ledger::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let (l, s) = (ledger.clone(), seen.clone());
        ledger.subscribe(EventKind::PendingChangeAdded, move |event| {
            if let LedgerEvent::PendingChangeAdded { device, .. } = event {
                s.store(l.list_pending(device).len(), Ordering::SeqCst);
            }
        });
        ledger.record(&DeviceId::new("r1"), "a", "", "");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
