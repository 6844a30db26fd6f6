//! Configuration transactions across device sessions.
//!
//! Applies edits and records them in the ledger, commits and discards on
//! one or many devices, and tracks confirmed-commit windows. There is no
//! cross-device rollback: a device that fails to commit stays dirty while
//! the others move on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::join_all;
use indexmap::IndexMap;
use log::{debug, info, warn};
use tokio::time::Instant;

use crate::config::Datastore;
use crate::error::{Result, SessionError};
use crate::ledger::{Ledger, PendingChange};
use crate::model::DeviceId;
use crate::payload::{EditConfigFilter, Payload};
use crate::reply::RpcReply;
use crate::session::{CommitOptions, DeviceSession};
use crate::template::TemplateStore;
use crate::vendors::{dialect, unsupported};

/// Result of a successful [`TransactionManager::apply`].
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// Serialized edit-config content that was sent.
    pub request: String,
    pub reply: RpcReply,
    /// The ledger entry created for the edit.
    pub change: PendingChange,
}

/// State of a device's confirmed-commit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmStatus {
    /// No confirmed commit is outstanding.
    None,
    /// Waiting for confirmation.
    Open { remaining: Duration },
    /// The deadline passed; the device has reverted. Pending ledger
    /// entries stay until [`TransactionManager::acknowledge_expired`].
    Expired,
}

/// A session shared between the facade and concurrent transactions.
pub type SharedSession = Arc<tokio::sync::Mutex<DeviceSession>>;

/// Edit/commit/discard orchestration over [`DeviceSession`]s.
#[derive(Debug)]
pub struct TransactionManager {
    ledger: Arc<Ledger>,
    store: Arc<TemplateStore>,
    windows: Mutex<HashMap<DeviceId, Instant>>,
}

impl TransactionManager {
    pub fn new(ledger: Arc<Ledger>, store: Arc<TemplateStore>) -> Self {
        Self {
            ledger,
            store,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// `edit-config` then record a pending change.
    ///
    /// A failed edit records nothing.
    pub async fn apply(&self, session: &mut DeviceSession, payload: &EditConfigFilter) -> Result<ApplyOutcome> {
        for warning in payload.warnings() {
            warn!("{}: {}: {}", session.hostname(), payload.name(), warning);
        }
        let request = payload.as_string();
        let reply = session.edit_config(payload).await?;
        let change = self
            .ledger
            .record(session.id(), payload.name(), request.clone(), reply.raw());
        info!("{}: applied {}", session.hostname(), payload.name());
        Ok(ApplyOutcome {
            request,
            reply,
            change,
        })
    }

    /// Commit one device.
    ///
    /// A plain commit settles the device's pending entries and closes an
    /// open confirmed-commit window. A confirmed commit opens a window and
    /// leaves the entries pending until it is confirmed.
    pub async fn commit(&self, session: &mut DeviceSession, options: CommitOptions) -> Result<()> {
        let id = session.id().clone();
        if let ConfirmStatus::Expired = self.confirm_status(&id) {
            return Err(SessionError::ConfirmWindowExpired(session.hostname().to_string()).into());
        }

        session.commit(options).await?;

        match options.confirmed {
            Some(timeout) => {
                info!("{}: confirmed commit, window {:?}", session.hostname(), timeout);
                self.windows().insert(id, Instant::now() + timeout);
            }
            None => {
                self.windows().remove(&id);
                let settled = self.ledger.mark_committed(&id);
                info!("{}: committed {} change(s)", session.hostname(), settled);
            }
        }
        Ok(())
    }

    /// Commit every session concurrently; one result per device.
    pub async fn commit_all(
        &self,
        sessions: &[SharedSession],
        options: CommitOptions,
    ) -> IndexMap<DeviceId, Result<()>> {
        let futures = sessions.iter().map(|shared| async move {
            let mut session = shared.lock().await;
            let result = self.commit(&mut session, options).await;
            (session.id().clone(), result)
        });
        join_all(futures).await.into_iter().collect()
    }

    /// Confirm an open confirmed commit.
    pub async fn confirm(&self, session: &mut DeviceSession) -> Result<()> {
        self.require_open_window(session)?;
        self.commit(session, CommitOptions::default()).await
    }

    /// Revert an open confirmed commit now. Its ledger entries are discarded.
    pub async fn cancel_commit(&self, session: &mut DeviceSession) -> Result<()> {
        self.require_open_window(session)?;
        session.cancel_commit().await?;
        self.windows().remove(session.id());
        self.ledger.mark_discarded(session.id());
        info!("{}: confirmed commit cancelled", session.hostname());
        Ok(())
    }

    pub fn confirm_status(&self, device: &DeviceId) -> ConfirmStatus {
        match self.windows().get(device) {
            None => ConfirmStatus::None,
            Some(deadline) => {
                let now = Instant::now();
                if now >= *deadline {
                    ConfirmStatus::Expired
                } else {
                    ConfirmStatus::Open {
                        remaining: *deadline - now,
                    }
                }
            }
        }
    }

    /// Close an expired window: the session forgets its staged edits and
    /// the stale pending entries are marked discarded. Returns how many.
    pub fn acknowledge_expired(&self, session: &mut DeviceSession) -> Result<usize> {
        match self.confirm_status(session.id()) {
            ConfirmStatus::Expired => {
                self.windows().remove(session.id());
                session.forget_staged();
                let discarded = self.ledger.mark_discarded(session.id());
                warn!(
                    "{}: confirmed commit expired, {} change(s) reverted",
                    session.hostname(),
                    discarded
                );
                Ok(discarded)
            }
            ConfirmStatus::Open { .. } => {
                Err(SessionError::NoConfirmWindow(format!("{} (still open)", session.hostname())).into())
            }
            ConfirmStatus::None => Err(SessionError::NoConfirmWindow(session.hostname().to_string()).into()),
        }
    }

    /// Drop uncommitted changes on one device.
    ///
    /// Vendors with a rollback RPC use it; otherwise `<discard-changes/>`
    /// when `:candidate` is advertised. Anything else is unsupported, and
    /// so is a session that edits running directly. An open confirmed
    /// commit is already live on the device and must be confirmed or
    /// cancelled instead.
    pub async fn discard(&self, session: &mut DeviceSession) -> Result<()> {
        let vendor = session.vendor();
        if let ConfirmStatus::Open { .. } = self.confirm_status(session.id()) {
            return Err(SessionError::ConfirmWindowOpen(session.hostname().to_string()).into());
        }
        if session.target() != Datastore::Candidate {
            return Err(unsupported("discard", vendor));
        }

        if let Some(rollback) = dialect(vendor).discard_payload(&self.store)? {
            debug!("{}: discarding with {}", session.hostname(), rollback.name());
            session.rollback_zero(&rollback).await?;
        } else if session.capabilities().supports_candidate() {
            session.discard().await?;
        } else {
            return Err(unsupported("discard", vendor));
        }

        self.windows().remove(session.id());
        let discarded = self.ledger.mark_discarded(session.id());
        info!("{}: discarded {} change(s)", session.hostname(), discarded);
        Ok(())
    }

    /// Discard on every session concurrently; one result per device.
    pub async fn discard_all(&self, sessions: &[SharedSession]) -> IndexMap<DeviceId, Result<()>> {
        let futures = sessions.iter().map(|shared| async move {
            let mut session = shared.lock().await;
            let result = self.discard(&mut session).await;
            (session.id().clone(), result)
        });
        join_all(futures).await.into_iter().collect()
    }

    /// Forget the confirm window of a device that is going away.
    pub(crate) fn forget(&self, device: &DeviceId) {
        self.windows().remove(device);
    }

    fn require_open_window(&self, session: &DeviceSession) -> Result<()> {
        match self.confirm_status(session.id()) {
            ConfirmStatus::Open { .. } => Ok(()),
            ConfirmStatus::Expired => {
                Err(SessionError::ConfirmWindowExpired(session.hostname().to_string()).into())
            }
            ConfirmStatus::None => Err(SessionError::NoConfirmWindow(session.hostname().to_string()).into()),
        }
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<DeviceId, Instant>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ErrorKind;
    use crate::ledger::ChangeStatus;
    use crate::model::{OspfConfig, Vendor, Vlan, VlanId};
    use crate::session::DeviceSpec;
    use crate::sim::SimulatedDevice;
    use crate::transport::{AuthMethod, SshConfig};

    fn store() -> Arc<TemplateStore> {
        Arc::new(TemplateStore::open(concat!(env!("CARGO_MANIFEST_DIR"), "/templates")).unwrap())
    }

    fn open(device: &SimulatedDevice, name: &str) -> DeviceSession {
        open_with(device, name, &Config::default())
    }

    fn open_with(device: &SimulatedDevice, name: &str, config: &Config) -> DeviceSession {
        let spec = DeviceSpec {
            id: DeviceId::new(name),
            hostname: name.to_string(),
            vendor: device.vendor(),
            ssh: SshConfig {
                host: name.to_string(),
                port: 830,
                username: "admin".to_string(),
                auth: AuthMethod::None,
                timeout: Duration::from_secs(5),
                host_key_verification: Default::default(),
                known_hosts_path: None,
            },
        };
        DeviceSession::from_transport(&spec, Box::new(device.connect()), config)
    }

    fn ospf() -> OspfConfig {
        OspfConfig::new("0.0.0.0")
            .with_reference_bandwidth(10_000)
            .with_network("GigabitEthernet2", "10.1.0.0/24".parse().unwrap())
    }

    #[tokio::test]
    async fn test_apply_then_commit_settles_ledger() {
        let store = store();
        let tx = TransactionManager::new(Arc::new(Ledger::new()), store.clone());
        let device = SimulatedDevice::ios_xe("r1");
        let mut session = open(&device, "r1");

        let payload = dialect(Vendor::IosXe).configure_ospf(&store, &ospf()).unwrap();
        let outcome = tx.apply(&mut session, &payload).await.unwrap();
        assert_eq!(outcome.change.name, "configure_ospf");
        assert!(outcome.reply.is_ok());
        assert_eq!(tx.ledger().list_pending(session.id()).len(), 1);

        tx.commit(&mut session, CommitOptions::default()).await.unwrap();
        assert!(tx.ledger().list_pending(session.id()).is_empty());
        assert!(!session.is_dirty());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_discard_uses_rollback_on_junos() {
        let store = store();
        let tx = TransactionManager::new(Arc::new(Ledger::new()), store.clone());
        let device = SimulatedDevice::junos("vsrx");
        let mut session = open(&device, "vsrx");

        let payload = dialect(Vendor::Junos).configure_ospf(&store, &ospf()).unwrap();
        tx.apply(&mut session, &payload).await.unwrap();
        tx.discard(&mut session).await.unwrap();

        let sent = device.requests();
        assert!(sent.last().unwrap().contains("load-configuration"));
        assert_eq!(tx.ledger().entries(session.id())[0].status, ChangeStatus::Discarded);
        assert!(!session.is_dirty());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_discard_without_candidate_is_unsupported() {
        let store = store();
        let tx = TransactionManager::new(Arc::new(Ledger::new()), store);
        let device = SimulatedDevice::ios_xe("r1").without_capability("candidate");
        let mut session = open(&device, "r1");
        let err = tx.discard(&mut session).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_discard_refused_while_confirm_window_open() {
        let store = store();
        let tx = TransactionManager::new(Arc::new(Ledger::new()), store.clone());
        let device = SimulatedDevice::ios_xe("r1");
        let mut session = open(&device, "r1");
        let id = session.id().clone();

        let payload = dialect(Vendor::IosXe).set_hostname(&store, "R1").unwrap();
        tx.apply(&mut session, &payload).await.unwrap();
        session.stage_hostname("R1");
        tx.commit(&mut session, CommitOptions::confirmed(Duration::from_secs(600)))
            .await
            .unwrap();
        let sent = device.requests().len();

        let err = tx.discard(&mut session).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(matches!(err, crate::Error::Session(SessionError::ConfirmWindowOpen(_))));
        assert_eq!(device.requests().len(), sent);
        assert!(matches!(tx.confirm_status(&id), ConfirmStatus::Open { .. }));
        assert_eq!(tx.ledger().list_pending(&id).len(), 1);

        // the confirmed change is still live; a plain commit keeps it
        let vlan = Vlan::new(VlanId::new(10).unwrap());
        let payload = dialect(Vendor::IosXe).create_vlan(&store, &vlan).unwrap();
        tx.apply(&mut session, &payload).await.unwrap();
        tx.commit(&mut session, CommitOptions::default()).await.unwrap();

        let entries = tx.ledger().entries(&id);
        assert!(entries.iter().all(|c| c.status == ChangeStatus::Committed));
        assert_eq!(device.running_hostname().as_deref(), Some("R1"));
        assert_eq!(session.hostname(), "R1");
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_discard_against_running_is_unsupported() {
        let store = store();
        let tx = TransactionManager::new(Arc::new(Ledger::new()), store.clone());
        let config = Config::default().with_target_datastore(Datastore::Running);
        let device = SimulatedDevice::ios_xe("r1");
        let mut session = open_with(&device, "r1", &config);

        let payload = dialect(Vendor::IosXe).set_hostname(&store, "R1").unwrap();
        tx.apply(&mut session, &payload).await.unwrap();
        let sent = device.requests().len();

        let err = tx.discard(&mut session).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(device.requests().len(), sent);
        assert_eq!(tx.ledger().entries(session.id())[0].status, ChangeStatus::Pending);
        assert!(session.is_dirty());
        assert_eq!(device.running_hostname().as_deref(), Some("R1"));
        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_window_lifecycle() {
        let store = store();
        let tx = TransactionManager::new(Arc::new(Ledger::new()), store.clone());
        let device = SimulatedDevice::ios_xe("r1");
        let mut session = open(&device, "r1");
        let id = session.id().clone();

        assert!(tx.confirm(&mut session).await.is_err());

        let payload = dialect(Vendor::IosXe).set_hostname(&store, "R1").unwrap();
        tx.apply(&mut session, &payload).await.unwrap();
        tx.commit(&mut session, CommitOptions::confirmed(Duration::from_secs(30)))
            .await
            .unwrap();
        assert!(matches!(tx.confirm_status(&id), ConfirmStatus::Open { .. }));
        assert_eq!(tx.ledger().list_pending(&id).len(), 1);

        tx.confirm(&mut session).await.unwrap();
        assert_eq!(tx.confirm_status(&id), ConfirmStatus::None);
        assert!(tx.ledger().list_pending(&id).is_empty());

        tx.apply(&mut session, &payload).await.unwrap();
        tx.commit(&mut session, CommitOptions::confirmed(Duration::from_secs(30)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(tx.confirm_status(&id), ConfirmStatus::Expired);

        let err = tx.confirm(&mut session).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(tx.ledger().list_pending(&id).len(), 1);

        assert_eq!(tx.acknowledge_expired(&mut session).unwrap(), 1);
        assert_eq!(tx.confirm_status(&id), ConfirmStatus::None);
        assert!(tx.ledger().list_pending(&id).is_empty());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_commit_discards_entries() {
        let store = store();
        let tx = TransactionManager::new(Arc::new(Ledger::new()), store.clone());
        let device = SimulatedDevice::ios_xe("r1");
        let mut session = open(&device, "r1");

        let payload = dialect(Vendor::IosXe).set_hostname(&store, "R9").unwrap();
        tx.apply(&mut session, &payload).await.unwrap();
        tx.commit(&mut session, CommitOptions::confirmed(Duration::from_secs(600)))
            .await
            .unwrap();
        assert_eq!(device.running_hostname().as_deref(), Some("R9"));

        tx.cancel_commit(&mut session).await.unwrap();
        assert_eq!(device.running_hostname().as_deref(), Some("r1"));
        assert_eq!(tx.ledger().entries(session.id())[0].status, ChangeStatus::Discarded);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_all_is_per_device() {
        let store = store();
        let tx = TransactionManager::new(Arc::new(Ledger::new()), store.clone());
        let good = SimulatedDevice::ios_xe("r1");
        let bad = SimulatedDevice::ios_xe("r2");
        bad.inject(crate::sim::Fault::RpcError {
            tag: "in-use".to_string(),
            message: "locked".to_string(),
        });

        let sessions: Vec<SharedSession> = [(&good, "r1"), (&bad, "r2")]
            .into_iter()
            .map(|(d, n)| Arc::new(tokio::sync::Mutex::new(open(d, n))))
            .collect();
        for shared in &sessions {
            let mut session = shared.lock().await;
            session.stage_hostname("x");
        }

        let results = tx.commit_all(&sessions, CommitOptions::default()).await;
        assert!(results[&DeviceId::new("r1")].is_ok());
        assert_eq!(
            results[&DeviceId::new("r2")].as_ref().unwrap_err().kind(),
            ErrorKind::Protocol
        );
        for shared in &sessions {
            shared.lock().await.close().await.unwrap();
        }
    }
}
