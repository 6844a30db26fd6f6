//! Operation facade.
//!
//! [`NetconfManager`] is the entry point a UI talks to. It owns the device
//! sessions, picks the vendor dialect for each operation, runs edits
//! through the [`TransactionManager`] and turns failures into
//! [`Error::Operation`] so the caller can show error kind and hostname.
//!
//! # Example
//!
//! ```rust,no_run
//! use ferrisconf::{CommitOptions, Config, DeviceBuilder, NetconfManager, Vendor};
//!
//! # async fn example() -> Result<(), ferrisconf::Error> {
//! let config = Config::default();
//! let manager = NetconfManager::new(config.clone())?;
//!
//! let spec = DeviceBuilder::new("192.0.2.10")
//!     .hostname("R1")
//!     .vendor(Vendor::IosXe)
//!     .username("admin")
//!     .password("secret")
//!     .build(&config)?;
//! let r1 = manager.connect(spec).await?;
//!
//! manager.set_hostname(&r1, "EDGE-1").await?;
//! for (device, result) in manager.commit(&[r1.clone()], CommitOptions::default()).await {
//!     result?;
//!     println!("{} committed", device);
//! }
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures_util::future::join_all;
use indexmap::IndexMap;
use ipnetwork::IpNetwork;
use log::{debug, error, info, warn};

use crate::config::{Config, Datastore};
use crate::error::{Error, ReplyError, Result, SessionError};
use crate::ledger::{Ledger, PendingChange};
use crate::model::{
    Capabilities, CryptoMapSummary, DeviceId, IkeParameters, Interface, IpsecParameters,
    OspfConfig, PeerParameters, SecurityZone, Subinterface, Switchport, Vlan,
};
use crate::payload::EditConfigFilter;
use crate::reply::{self, RpcReply};
use crate::session::{CommitOptions, DeviceSession, DeviceSpec};
use crate::template::TemplateStore;
use crate::topology::{Link, Port, Topology};
use crate::transaction::{ApplyOutcome, ConfirmStatus, SharedSession, TransactionManager};
use crate::transport::{Connector, SshConnector};
use crate::vendors::dialect;
use crate::xml::Element;

/// Facade over every managed device.
pub struct NetconfManager {
    config: Config,
    store: Arc<TemplateStore>,
    connector: Arc<dyn Connector>,
    devices: RwLock<IndexMap<DeviceId, SharedSession>>,
    transactions: TransactionManager,
    topology: Mutex<Topology>,
}

impl std::fmt::Debug for NetconfManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetconfManager")
            .field("devices", &self.device_ids())
            .field("target", &self.config.target_datastore)
            .finish_non_exhaustive()
    }
}

impl NetconfManager {
    /// Manager connecting over SSH, with templates from `config.template_dir`.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_connector(config, Arc::new(SshConnector))
    }

    /// Manager opening transports through `connector`.
    pub fn with_connector(config: Config, connector: Arc<dyn Connector>) -> Result<Self> {
        let store = Arc::new(TemplateStore::open(&config.template_dir)?);
        let ledger = Arc::new(Ledger::new());
        Ok(Self {
            transactions: TransactionManager::new(ledger, store.clone()),
            config,
            store,
            connector,
            devices: RwLock::new(IndexMap::new()),
            topology: Mutex::new(Topology::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        self.transactions.ledger()
    }

    /// Ids of the connected devices, in connection order.
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices_read().keys().cloned().collect()
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Open a session and start managing the device.
    pub async fn connect(&self, spec: DeviceSpec) -> Result<DeviceId> {
        if self.devices_read().contains_key(&spec.id) {
            return Err(SessionError::AlreadyConnected(spec.id.to_string()).into());
        }

        info!("{}: connecting to {}", spec.hostname, spec.ssh.socket_addr());
        let session = match DeviceSession::open(&spec, &self.config, self.connector.as_ref()).await {
            Ok(session) => session,
            Err(e) => return Err(self.failed(&spec.hostname, "connect", None, e)),
        };

        let id = spec.id.clone();
        let shared = Arc::new(tokio::sync::Mutex::new(session));
        let raced = {
            let mut devices = self.devices_write();
            if devices.contains_key(&id) {
                true
            } else {
                devices.insert(id.clone(), shared.clone());
                false
            }
        };
        if raced {
            let mut session = shared.lock().await;
            if let Err(e) = session.close().await {
                debug!("{}: closing duplicate session failed: {}", spec.hostname, e);
            }
            return Err(SessionError::AlreadyConnected(id.to_string()).into());
        }

        info!("{}: connected as {}", spec.hostname, id);
        Ok(id)
    }

    /// Close the device's session and forget it.
    ///
    /// Uncommitted changes stay in the ledger as pending.
    pub async fn disconnect(&self, device: &DeviceId) -> Result<()> {
        let shared = self
            .devices_write()
            .shift_remove(device)
            .ok_or_else(|| SessionError::UnknownDevice(device.to_string()))?;
        self.transactions.forget(device);
        let removed = self.topology().remove_device(device);
        if removed > 0 {
            debug!("{}: dropped {} link(s)", device, removed);
        }

        let mut session = shared.lock().await;
        let result = session.close().await;
        info!("{}: disconnected", session.hostname());
        self.report(&session, "disconnect", result)
    }

    /// Close every session concurrently. Failures are logged.
    pub async fn shutdown(&self) {
        let devices: Vec<DeviceId> = self.device_ids();
        let results = join_all(devices.iter().map(|id| self.disconnect(id))).await;
        for (id, result) in devices.iter().zip(results) {
            if let Err(e) = result {
                warn!("{}: shutdown: {}", id, e);
            }
        }
    }

    // ---------------------------------------------------------------------
    // System
    // ---------------------------------------------------------------------

    /// Stage a hostname change. The session hostname follows on commit.
    pub async fn set_hostname(&self, device: &DeviceId, hostname: &str) -> Result<ApplyOutcome> {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = async {
            let payload = dialect(session.vendor()).set_hostname(&self.store, hostname)?;
            let outcome = self.transactions.apply(&mut session, &payload).await?;
            session.stage_hostname(hostname);
            Ok::<_, Error>(outcome)
        }
        .await;
        self.report(&session, "set_hostname", result)
    }

    /// Read the hostname from the device.
    pub async fn get_hostname(&self, device: &DeviceId) -> Result<String> {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = async {
            let filter = dialect(session.vendor()).get_hostname(&self.store)?;
            let reply = session.get(&filter).await?;
            reply::to_hostname(reply.root())
                .ok_or_else(|| Error::from(ReplyError::Malformed("reply carries no hostname".to_string())))
        }
        .await;
        self.report(&session, "get_hostname", result)
    }

    // ---------------------------------------------------------------------
    // Interfaces
    // ---------------------------------------------------------------------

    /// Read every interface and refresh the session cache.
    pub async fn get_interfaces(&self, device: &DeviceId) -> Result<Vec<Interface>> {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = async {
            let filter = dialect(session.vendor()).get_interfaces(&self.store)?;
            let reply = session.get(&filter).await?;
            let interfaces = reply::to_interfaces(reply.root());
            session.set_interfaces(interfaces.clone());
            Ok::<_, Error>(interfaces)
        }
        .await;
        self.report(&session, "get_interfaces", result)
    }

    /// Read the subinterfaces of one interface.
    pub async fn get_subinterfaces(&self, device: &DeviceId, interface: &str) -> Result<Vec<Subinterface>> {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = async {
            let filter = dialect(session.vendor()).get_interface(&self.store, interface)?;
            let reply = session.get(&filter).await?;
            Ok::<_, Error>(reply::to_subinterfaces(reply.root(), interface))
        }
        .await;
        self.report(&session, "get_subinterfaces", result)
    }

    pub async fn add_interface_ip(
        &self,
        device: &DeviceId,
        interface: &str,
        index: u32,
        address: IpNetwork,
    ) -> Result<ApplyOutcome> {
        self.edit(device, "add_interface_ip", |d, store| {
            d.add_interface_ip(store, interface, index, address)
        })
        .await
    }

    pub async fn delete_interface_ip(
        &self,
        device: &DeviceId,
        interface: &str,
        index: u32,
        address: IpNetwork,
    ) -> Result<ApplyOutcome> {
        self.edit(device, "delete_interface_ip", |d, store| {
            d.delete_interface_ip(store, interface, index, address)
        })
        .await
    }

    /// Replace `old` with `new` on a subinterface: a delete edit followed by
    /// an add edit, both recorded. Both payloads are built before either is
    /// sent.
    pub async fn replace_interface_ip(
        &self,
        device: &DeviceId,
        interface: &str,
        index: u32,
        old: IpNetwork,
        new: IpNetwork,
    ) -> Result<[ApplyOutcome; 2]> {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = async {
            let d = dialect(session.vendor());
            let delete = d.delete_interface_ip(&self.store, interface, index, old)?;
            let add = d.add_interface_ip(&self.store, interface, index, new)?;
            let deleted = self.transactions.apply(&mut session, &delete).await?;
            let added = self.transactions.apply(&mut session, &add).await?;
            Ok::<_, Error>([deleted, added])
        }
        .await;
        self.report(&session, "replace_interface_ip", result)
    }

    pub async fn configure_interface_vlan(
        &self,
        device: &DeviceId,
        interface: &str,
        switchport: &Switchport,
    ) -> Result<ApplyOutcome> {
        self.edit(device, "configure_interface_vlan", |d, store| {
            d.configure_interface_vlan(store, interface, switchport)
        })
        .await
    }

    // ---------------------------------------------------------------------
    // VLANs
    // ---------------------------------------------------------------------

    /// Read the VLAN table and refresh the session cache.
    pub async fn get_vlans(&self, device: &DeviceId) -> Result<Vec<Vlan>> {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = async {
            let filter = dialect(session.vendor()).get_vlans(&self.store)?;
            let reply = session.get_config(Datastore::Running, Some(&filter)).await?;
            let vlans = reply::to_vlans(reply.root());
            session.set_vlans(vlans.clone());
            Ok::<_, Error>(vlans)
        }
        .await;
        self.report(&session, "get_vlans", result)
    }

    pub async fn create_vlan(&self, device: &DeviceId, vlan: &Vlan) -> Result<ApplyOutcome> {
        self.edit(device, "create_vlan", |d, store| d.create_vlan(store, vlan))
            .await
    }

    pub async fn delete_vlan(&self, device: &DeviceId, vlan: &Vlan) -> Result<ApplyOutcome> {
        self.edit(device, "delete_vlan", |d, store| d.delete_vlan(store, vlan))
            .await
    }

    // ---------------------------------------------------------------------
    // Routing and security
    // ---------------------------------------------------------------------

    pub async fn configure_ospf(&self, device: &DeviceId, config: &OspfConfig) -> Result<ApplyOutcome> {
        self.edit(device, "configure_ospf", |d, store| d.configure_ospf(store, config))
            .await
    }

    /// The OSPF subtree of the running configuration, namespace-free.
    pub async fn get_ospf(&self, device: &DeviceId) -> Result<Element> {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = async {
            let filter = dialect(session.vendor()).get_ospf(&self.store)?;
            let reply = session.get_config(Datastore::Running, Some(&filter)).await?;
            Ok::<_, Error>(data_of(reply))
        }
        .await;
        self.report(&session, "get_ospf", result)
    }

    /// Configure both ends of an IPSec tunnel.
    ///
    /// The peer records must mirror each other. Both payloads are built
    /// before anything is sent; the two edits then run concurrently and
    /// each device reports its own result.
    pub async fn configure_ipsec(
        &self,
        a: &DeviceId,
        b: &DeviceId,
        peer_a: &PeerParameters,
        peer_b: &PeerParameters,
        ike: &IkeParameters,
        ipsec: &IpsecParameters,
    ) -> Result<IndexMap<DeviceId, Result<ApplyOutcome>>> {
        if a == b {
            return Err(Error::invalid(format!("IPSec needs two devices, got {} twice", a)));
        }
        if !peer_a.mirrors(peer_b) {
            return Err(Error::invalid(format!(
                "peer parameters of {} and {} do not mirror each other",
                a, b
            )));
        }

        let (shared_a, shared_b) = (self.session(a)?, self.session(b)?);
        let payload_a = self.build_ipsec(&shared_a, peer_a, ike, ipsec).await?;
        let payload_b = self.build_ipsec(&shared_b, peer_b, ike, ipsec).await?;

        let apply = |shared: SharedSession, payload: EditConfigFilter| async move {
            let mut session = shared.lock().await;
            let result = self.transactions.apply(&mut session, &payload).await;
            self.report(&session, "configure_ipsec", result)
        };
        let (result_a, result_b) = tokio::join!(apply(shared_a, payload_a), apply(shared_b, payload_b));

        let mut results = IndexMap::new();
        results.insert(a.clone(), result_a);
        results.insert(b.clone(), result_b);
        Ok(results)
    }

    async fn build_ipsec(
        &self,
        shared: &SharedSession,
        peer: &PeerParameters,
        ike: &IkeParameters,
        ipsec: &IpsecParameters,
    ) -> Result<EditConfigFilter> {
        let session = shared.lock().await;
        let built = dialect(session.vendor()).configure_ipsec(&self.store, peer, ike, ipsec);
        self.report(&session, "configure_ipsec", built)
    }

    /// The IOS-XE crypto map binding in the running configuration.
    pub async fn get_crypto_map(&self, device: &DeviceId) -> Result<CryptoMapSummary> {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = async {
            let filter = dialect(session.vendor()).get_crypto_map(&self.store)?;
            let reply = session.get_config(Datastore::Running, Some(&filter)).await?;
            Ok::<_, Error>(reply::to_crypto_map(reply.root()))
        }
        .await;
        self.report(&session, "get_crypto_map", result)
    }

    /// Junos security zones.
    pub async fn get_zones(&self, device: &DeviceId) -> Result<Vec<SecurityZone>> {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = async {
            let payload = dialect(session.vendor()).get_zones(&self.store)?;
            let reply = session.dispatch(&payload).await?;
            Ok::<_, Error>(reply::to_zones(reply.root()))
        }
        .await;
        self.report(&session, "get_zones", result)
    }

    // ---------------------------------------------------------------------
    // Device state
    // ---------------------------------------------------------------------

    /// The whole running configuration, namespace-free.
    pub async fn get_running_config(&self, device: &DeviceId) -> Result<Element> {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = session
            .get_config(Datastore::Running, None)
            .await
            .map(data_of);
        self.report(&session, "get_running_config", result)
    }

    /// Capabilities from the server hello.
    pub async fn get_capabilities(&self, device: &DeviceId) -> Result<Capabilities> {
        let shared = self.session(device)?;
        let session = shared.lock().await;
        Ok(session.capabilities().clone())
    }

    /// Hostname as of the last commit.
    pub async fn hostname(&self, device: &DeviceId) -> Result<String> {
        let shared = self.session(device)?;
        let session = shared.lock().await;
        Ok(session.hostname().to_string())
    }

    /// Whether the device holds uncommitted edits.
    pub async fn is_dirty(&self, device: &DeviceId) -> Result<bool> {
        let shared = self.session(device)?;
        let session = shared.lock().await;
        Ok(session.is_dirty())
    }

    // ---------------------------------------------------------------------
    // Transactions
    // ---------------------------------------------------------------------

    /// Commit on every listed device concurrently. Devices that fail stay
    /// dirty; the others are not rolled back.
    pub async fn commit(&self, devices: &[DeviceId], options: CommitOptions) -> IndexMap<DeviceId, Result<()>> {
        let (sessions, mut results) = self.resolve(devices);
        let outcome = self.transactions.commit_all(&sessions, options).await;
        self.collect(&sessions, outcome, "commit", &mut results).await;
        results
    }

    /// Confirm an open confirmed commit.
    pub async fn confirm(&self, device: &DeviceId) -> Result<()> {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = self.transactions.confirm(&mut session).await;
        self.report(&session, "confirm", result)
    }

    /// Revert an open confirmed commit now.
    pub async fn cancel_commit(&self, device: &DeviceId) -> Result<()> {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = self.transactions.cancel_commit(&mut session).await;
        self.report(&session, "cancel_commit", result)
    }

    pub fn confirm_status(&self, device: &DeviceId) -> Result<ConfirmStatus> {
        self.session(device)?;
        Ok(self.transactions.confirm_status(device))
    }

    /// Settle an expired confirmed commit: stale pending entries become
    /// discarded. Returns how many.
    pub async fn acknowledge_expired(&self, device: &DeviceId) -> Result<usize> {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = self.transactions.acknowledge_expired(&mut session);
        self.report(&session, "acknowledge_expired", result)
    }

    /// Drop uncommitted changes on every listed device concurrently.
    pub async fn discard(&self, devices: &[DeviceId]) -> IndexMap<DeviceId, Result<()>> {
        let (sessions, mut results) = self.resolve(devices);
        let outcome = self.transactions.discard_all(&sessions).await;
        self.collect(&sessions, outcome, "discard", &mut results).await;
        results
    }

    /// Pending ledger entries of a device.
    pub fn pending(&self, device: &DeviceId) -> Vec<PendingChange> {
        self.ledger().list_pending(device)
    }

    // ---------------------------------------------------------------------
    // Topology
    // ---------------------------------------------------------------------

    /// Link two interfaces of connected devices.
    pub fn link(&self, a: Port, b: Port) -> Result<Link> {
        for port in [&a, &b] {
            self.session(&port.device)?;
        }
        let link = self.topology().link(a, b)?;
        debug!("linked {}", link);
        Ok(link)
    }

    pub fn unlink(&self, a: Port, b: Port) -> bool {
        self.topology().unlink(a, b)
    }

    pub fn links(&self) -> Vec<Link> {
        self.topology().links().cloned().collect()
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    /// Build a payload with the device's dialect and apply it.
    async fn edit<F>(&self, device: &DeviceId, operation: &str, build: F) -> Result<ApplyOutcome>
    where
        F: FnOnce(&'static dyn crate::vendors::VendorDialect, &TemplateStore) -> Result<EditConfigFilter>,
    {
        let shared = self.session(device)?;
        let mut session = shared.lock().await;
        let result = async {
            let payload = build(dialect(session.vendor()), &self.store)?;
            self.transactions.apply(&mut session, &payload).await
        }
        .await;
        self.report(&session, operation, result)
    }

    fn session(&self, device: &DeviceId) -> Result<SharedSession> {
        self.devices_read()
            .get(device)
            .cloned()
            .ok_or_else(|| SessionError::UnknownDevice(device.to_string()).into())
    }

    /// Known sessions for `devices`, plus error entries for unknown ids.
    fn resolve(&self, devices: &[DeviceId]) -> (Vec<SharedSession>, IndexMap<DeviceId, Result<()>>) {
        let mut sessions = Vec::with_capacity(devices.len());
        let mut results = IndexMap::new();
        for id in devices {
            if results.contains_key(id) {
                continue;
            }
            match self.session(id) {
                Ok(shared) => {
                    sessions.push(shared);
                    results.insert(id.clone(), Ok(()));
                }
                Err(e) => {
                    results.insert(id.clone(), Err(e));
                }
            }
        }
        (sessions, results)
    }

    async fn collect(
        &self,
        sessions: &[SharedSession],
        outcome: IndexMap<DeviceId, Result<()>>,
        operation: &str,
        results: &mut IndexMap<DeviceId, Result<()>>,
    ) {
        for (shared, (id, result)) in sessions.iter().zip(outcome) {
            let session = shared.lock().await;
            results.insert(id, self.report(&session, operation, result));
        }
    }

    fn report<T>(&self, session: &DeviceSession, operation: &str, result: Result<T>) -> Result<T> {
        result.map_err(|e| self.failed(session.hostname(), operation, session.last_request(), e))
    }

    /// Log a failure with its context and wrap it.
    fn failed(&self, hostname: &str, operation: &str, request: Option<&str>, e: Error) -> Error {
        if matches!(e, Error::Operation { .. }) {
            return e;
        }
        error!("{}: {} failed [{}]: {}", hostname, operation, e.kind(), e);
        if let Error::Protocol(errors) = &e {
            if let Some(request) = request {
                error!("{}: request: {}", hostname, request);
            }
            error!("{}: reply: {}", hostname, errors.raw_reply);
        }
        Error::Operation {
            hostname: hostname.to_string(),
            operation: operation.to_string(),
            source: Box::new(e),
        }
    }

    fn devices_read(&self) -> std::sync::RwLockReadGuard<'_, IndexMap<DeviceId, SharedSession>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn devices_write(&self) -> std::sync::RwLockWriteGuard<'_, IndexMap<DeviceId, SharedSession>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn topology(&self) -> MutexGuard<'_, Topology> {
        self.topology.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn data_of(reply: RpcReply) -> Element {
    let root = reply.into_root();
    root.find("data").cloned().unwrap_or_else(|| Element::new("data"))
}
