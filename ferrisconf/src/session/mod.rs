//! Per-device NETCONF session.
//!
//! A [`DeviceSession`] owns one transport and issues one RPC at a time.
//! It tracks whether the target datastore holds uncommitted changes and
//! keeps the device hostname, interface and VLAN caches.
//!
//! State machine:
//!
//! ```text
//! Disconnected -> Connecting -> Ready <-> Dirty
//!                                 |         |
//!                                 v         v
//!                              Closing -> Closed
//!
//! any transport error or timeout -> Broken (only close() is accepted)
//! ```

mod builder;

pub use builder::DeviceBuilder;

use std::fmt;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::config::{Config, Datastore};
use crate::error::{Error, Result, SessionError, TransportError};
use crate::model::{Capabilities, DeviceId, Interface, Vendor, Vlan, capability};
use crate::payload::{DispatchPayload, EditConfigFilter, GetFilter, Payload};
use crate::reply::RpcReply;
use crate::transport::{Connector, NetconfTransport, SshConfig};
use crate::xml::{Element, NETCONF_BASE_NS};

/// Everything needed to open a session to one device.
#[derive(Debug)]
pub struct DeviceSpec {
    pub id: DeviceId,
    pub hostname: String,
    pub vendor: Vendor,
    pub ssh: SshConfig,
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
    /// The target datastore holds uncommitted edits.
    Dirty,
    Closing,
    Closed,
    /// A transport failure or timeout; reconnect required.
    Broken,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Ready => "ready",
            SessionState::Dirty => "dirty",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Broken => "broken",
        };
        f.write_str(name)
    }
}

/// Options for `<commit>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Open a confirmed-commit window of this length.
    pub confirmed: Option<Duration>,
}

impl CommitOptions {
    pub fn confirmed(timeout: Duration) -> Self {
        Self {
            confirmed: Some(timeout),
        }
    }
}

/// One NETCONF session to one device.
pub struct DeviceSession {
    id: DeviceId,
    hostname: String,
    vendor: Vendor,
    transport: Option<Box<dyn NetconfTransport>>,
    capabilities: Capabilities,
    session_id: Option<u32>,
    state: SessionState,
    target: Datastore,
    rpc_timeout: Duration,
    next_message_id: u64,
    staged_hostname: Option<String>,
    last_request: Option<String>,
    interfaces: Vec<Interface>,
    vlans: Vec<Vlan>,
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("id", &self.id)
            .field("hostname", &self.hostname)
            .field("vendor", &self.vendor)
            .field("state", &self.state)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl DeviceSession {
    /// A session that has not connected yet.
    pub fn new(spec: &DeviceSpec, config: &Config) -> Self {
        Self {
            id: spec.id.clone(),
            hostname: spec.hostname.clone(),
            vendor: spec.vendor,
            transport: None,
            capabilities: Capabilities::default(),
            session_id: None,
            state: SessionState::Disconnected,
            target: config.target_datastore,
            rpc_timeout: config.rpc_timeout(),
            next_message_id: 101,
            staged_hostname: None,
            last_request: None,
            interfaces: Vec::new(),
            vlans: Vec::new(),
        }
    }

    /// Connect through `connector` and complete the hello exchange.
    pub async fn open(spec: &DeviceSpec, config: &Config, connector: &dyn Connector) -> Result<Self> {
        let mut session = Self::new(spec, config);
        session.connect(spec, connector).await?;
        Ok(session)
    }

    /// Wrap a transport that already finished its hello exchange.
    pub fn from_transport(spec: &DeviceSpec, transport: Box<dyn NetconfTransport>, config: &Config) -> Self {
        let mut session = Self::new(spec, config);
        session.transition(SessionState::Connecting);
        session.attach(transport);
        session
    }

    /// Disconnected -> Connecting -> Ready. A failed attempt returns the
    /// session to Disconnected so it can be retried.
    pub async fn connect(&mut self, spec: &DeviceSpec, connector: &dyn Connector) -> Result<()> {
        if self.state != SessionState::Disconnected {
            return Err(SessionError::AlreadyConnected(self.id.to_string()).into());
        }
        self.transition(SessionState::Connecting);
        match connector.connect(spec).await {
            Ok(transport) => {
                self.attach(transport);
                Ok(())
            }
            Err(e) => {
                self.transition(SessionState::Disconnected);
                Err(e)
            }
        }
    }

    fn attach(&mut self, transport: Box<dyn NetconfTransport>) {
        let hello = transport.server_hello();
        self.capabilities = hello.capabilities.iter().map(String::as_str).collect();
        self.session_id = hello.session_id;
        debug!(
            "{}: session {:?} ready ({} capabilities, target {})",
            self.hostname,
            self.session_id,
            self.capabilities.len(),
            self.target
        );
        self.transport = Some(transport);
        self.transition(SessionState::Ready);
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Hostname as of the last successful commit.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn session_id(&self) -> Option<u32> {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == SessionState::Dirty
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Ready | SessionState::Dirty)
    }

    /// Datastore `edit-config` targets.
    pub fn target(&self) -> Datastore {
        self.target
    }

    /// Hostname written to the datastore but not committed yet.
    pub fn staged_hostname(&self) -> Option<&str> {
        self.staged_hostname.as_deref()
    }

    /// The last `<rpc>` document sent.
    pub fn last_request(&self) -> Option<&str> {
        self.last_request.as_deref()
    }

    /// Interfaces from the last refresh.
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    /// Replace the interface cache.
    pub fn set_interfaces(&mut self, interfaces: Vec<Interface>) {
        self.interfaces = interfaces;
    }

    /// VLANs from the last refresh.
    pub fn vlans(&self) -> &[Vlan] {
        &self.vlans
    }

    /// Replace the VLAN cache.
    pub fn set_vlans(&mut self, vlans: Vec<Vlan>) {
        self.vlans = vlans;
    }

    /// Remember a hostname edit; it becomes [`hostname`](Self::hostname)
    /// on the next successful plain commit.
    pub fn stage_hostname(&mut self, hostname: impl Into<String>) {
        self.staged_hostname = Some(hostname.into());
    }

    // ---------------------------------------------------------------------
    // RPC surface
    // ---------------------------------------------------------------------

    /// `<get>` with a subtree filter.
    pub async fn get(&mut self, filter: &GetFilter) -> Result<RpcReply> {
        let mut get = base("get");
        get.push(subtree_filter(filter));
        self.rpc(get).await
    }

    /// `<get-config>` from `source`, optionally filtered.
    pub async fn get_config(&mut self, source: Datastore, filter: Option<&GetFilter>) -> Result<RpcReply> {
        let mut get_config = base("get-config");
        get_config.push(datastore("source", source));
        if let Some(filter) = filter {
            get_config.push(subtree_filter(filter));
        }
        self.rpc(get_config).await
    }

    /// `<edit-config>` against the configured target datastore.
    ///
    /// Adds `rollback-on-error` when the server advertises it. A
    /// successful edit leaves the session dirty.
    pub async fn edit_config(&mut self, payload: &EditConfigFilter) -> Result<RpcReply> {
        self.ensure_usable()?;
        self.require_target_capability("edit-config")?;

        let mut edit = base("edit-config");
        edit.push(datastore("target", self.target));
        if self.capabilities.supports_rollback_on_error() {
            edit.push(base("error-option").with_text("rollback-on-error"));
        }
        edit.push(base("config")).push(payload.as_element().clone());

        let reply = self.rpc(edit).await?;
        self.transition(SessionState::Dirty);
        Ok(reply)
    }

    /// Send a complete RPC element as-is.
    pub async fn dispatch(&mut self, payload: &DispatchPayload) -> Result<RpcReply> {
        let mut operation = payload.as_element().clone();
        operation.adopt_namespace(NETCONF_BASE_NS);
        self.rpc(operation).await
    }

    /// `<commit>`, plain or confirmed.
    ///
    /// A plain commit also confirms an open confirmed commit and applies a
    /// staged hostname. A confirmed commit keeps the hostname staged until
    /// it is confirmed. With a non-candidate target this is a local no-op
    /// that only clears the dirty flag.
    pub async fn commit(&mut self, options: CommitOptions) -> Result<()> {
        self.ensure_usable()?;
        if self.target != Datastore::Candidate {
            debug!("{}: target is {}, nothing to commit", self.hostname, self.target);
            self.apply_staged_hostname();
            self.transition(SessionState::Ready);
            return Ok(());
        }
        self.require(capability::CANDIDATE, "commit")?;

        let mut commit = base("commit");
        if let Some(timeout) = options.confirmed {
            self.require(capability::CONFIRMED_COMMIT, "confirmed commit")?;
            commit.push(base("confirmed"));
            commit.push(base("confirm-timeout").with_text(timeout.as_secs().max(1).to_string()));
        }
        self.rpc(commit).await?;

        if options.confirmed.is_none() {
            self.apply_staged_hostname();
        }
        self.transition(SessionState::Ready);
        Ok(())
    }

    /// `<discard-changes/>`: reset the candidate to running.
    pub async fn discard(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.require(capability::CANDIDATE, "discard-changes")?;
        self.rpc(base("discard-changes")).await?;
        self.forget_staged();
        Ok(())
    }

    /// `<cancel-commit/>`: revert an open confirmed commit now.
    pub async fn cancel_commit(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.require(capability::CONFIRMED_COMMIT, "cancel-commit")?;
        self.rpc(base("cancel-commit")).await?;
        self.forget_staged();
        Ok(())
    }

    /// Dispatch a vendor rollback-zero RPC dropping uncommitted changes.
    pub async fn rollback_zero(&mut self, payload: &DispatchPayload) -> Result<()> {
        self.dispatch(payload).await?;
        self.forget_staged();
        Ok(())
    }

    /// `<validate>` a datastore.
    pub async fn validate(&mut self, source: Datastore) -> Result<()> {
        self.ensure_usable()?;
        self.require(capability::VALIDATE, "validate")?;
        let mut validate = base("validate");
        validate.push(datastore("source", source));
        self.rpc(validate).await?;
        Ok(())
    }

    pub async fn lock(&mut self, target: Datastore) -> Result<()> {
        let mut lock = base("lock");
        lock.push(datastore("target", target));
        self.rpc(lock).await?;
        Ok(())
    }

    pub async fn unlock(&mut self, target: Datastore) -> Result<()> {
        let mut unlock = base("unlock");
        unlock.push(datastore("target", target));
        self.rpc(unlock).await?;
        Ok(())
    }

    /// Close the session. Idempotent; valid from any state.
    pub async fn close(&mut self) -> Result<()> {
        match self.state {
            SessionState::Closed => return Ok(()),
            SessionState::Ready | SessionState::Dirty => {
                if self.is_dirty() {
                    warn!("{}: closing with uncommitted changes", self.hostname);
                }
                self.transition(SessionState::Closing);
                let message = self.envelope(base("close-session"));
                if let Some(transport) = self.transport.as_mut() {
                    let outcome = tokio::time::timeout(self.rpc_timeout, transport.send_rpc(&message)).await;
                    match outcome {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => debug!("{}: close-session failed: {}", self.hostname, e),
                        Err(_) => debug!("{}: close-session timed out", self.hostname),
                    }
                }
            }
            _ => self.transition(SessionState::Closing),
        }

        let result = match self.transport.take() {
            Some(mut transport) => transport.close().await,
            None => Ok(()),
        };
        self.transition(SessionState::Closed);
        result
    }

    /// Revert local bookkeeping after the device rolled back on its own
    /// (expired confirmed commit).
    pub(crate) fn forget_staged(&mut self) {
        self.staged_hostname = None;
        if self.state == SessionState::Dirty {
            self.transition(SessionState::Ready);
        }
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    async fn rpc(&mut self, operation: Element) -> Result<RpcReply> {
        self.ensure_usable()?;
        let message = self.envelope(operation);
        trace!("{} rpc: {}", self.hostname, message);
        self.last_request = Some(message.clone());

        let Some(transport) = self.transport.as_mut() else {
            return Err(SessionError::Closed.into());
        };
        let outcome = tokio::time::timeout(self.rpc_timeout, transport.send_rpc(&message)).await;
        let raw = match outcome {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                if e.breaks_session() {
                    self.transition(SessionState::Broken);
                }
                return Err(e);
            }
            Err(_) => {
                self.transition(SessionState::Broken);
                return Err(TransportError::Timeout(self.rpc_timeout).into());
            }
        };
        trace!("{} reply: {}", self.hostname, raw);
        RpcReply::parse(raw.as_bytes())
    }

    fn envelope(&mut self, operation: Element) -> String {
        let message_id = self.next_message_id;
        self.next_message_id += 1;
        base("rpc")
            .with_attribute("message-id", message_id.to_string())
            .with_child(operation)
            .to_xml()
    }

    fn ensure_usable(&self) -> Result<()> {
        match self.state {
            SessionState::Ready | SessionState::Dirty => Ok(()),
            SessionState::Broken => Err(SessionError::Broken.into()),
            _ => Err(SessionError::Closed.into()),
        }
    }

    fn require(&self, name: &str, operation: &str) -> Result<()> {
        if self.capabilities.supports(name) {
            Ok(())
        } else {
            Err(Error::Session(SessionError::MissingCapability {
                capability: format!(":{}", name),
                operation: operation.to_string(),
            }))
        }
    }

    fn require_target_capability(&self, operation: &str) -> Result<()> {
        match self.target {
            Datastore::Candidate => self.require(capability::CANDIDATE, operation),
            Datastore::Running => self.require(capability::WRITABLE_RUNNING, operation),
            Datastore::Startup => self.require(capability::STARTUP, operation),
        }
    }

    fn apply_staged_hostname(&mut self) {
        if let Some(hostname) = self.staged_hostname.take() {
            debug!("{}: hostname is now {}", self.hostname, hostname);
            self.hostname = hostname;
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!("{}: {} -> {}", self.hostname, self.state, next);
            self.state = next;
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if self.is_open() {
            warn!(
                "{}: session dropped while open; call close() to end it cleanly",
                self.hostname
            );
        }
    }
}

fn base(name: &str) -> Element {
    Element::in_namespace(NETCONF_BASE_NS, name)
}

fn datastore(wrapper: &str, store: Datastore) -> Element {
    base(wrapper).with_child(base(store.as_str()))
}

fn subtree_filter(filter: &GetFilter) -> Element {
    base("filter")
        .with_attribute("type", "subtree")
        .with_child(filter.as_element().clone())
}
