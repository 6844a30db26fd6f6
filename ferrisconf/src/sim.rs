//! Simulated NETCONF devices.
//!
//! A [`SimulatedDevice`] keeps running and candidate datastores as
//! namespace-free element trees and answers the RPCs a session sends:
//! subtree-filtered `<get>`/`<get-config>`, merging `<edit-config>` with
//! `operation="delete"`, plain and confirmed `<commit>`, `<cancel-commit>`,
//! `<discard-changes>`, locks and the Junos rollback and zone RPCs.
//!
//! Replies pass through the real NETCONF framing so the decoder is
//! exercised end to end. Faults can be queued to make the next RPC fail,
//! stall or drop the connection.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use tokio::time::Instant;

use crate::error::{Result, TransportError};
use crate::model::{Vendor, capability};
use crate::session::DeviceSpec;
use crate::transport::{
    BASE_1_0, BASE_1_1, Connector, FrameDecoder, Framing, NetconfTransport, ServerHello,
};
use crate::xml::Element;

/// Leaf names that identify a list entry when they come first.
const LIST_KEYS: &[&str] = &[
    "name",
    "id",
    "index",
    "ip",
    "identifier",
    "number",
    "tag",
    "ipv4-addr",
    "sequence",
    "interface",
];

/// Failure injected into the next RPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Answer with an `<rpc-error>` of severity `error`.
    RpcError { tag: String, message: String },
    /// Hold the reply back for this long before answering normally.
    Delay(Duration),
    /// Drop the connection instead of answering.
    Disconnect,
}

#[derive(Debug)]
struct ConfirmWindow {
    backup: Element,
    deadline: Instant,
}

#[derive(Debug)]
struct SimState {
    vendor: Vendor,
    capabilities: Vec<String>,
    running: Element,
    candidate: Element,
    confirm: Option<ConfirmWindow>,
    locks: HashMap<String, u32>,
    faults: VecDeque<Fault>,
    requests: Vec<String>,
    next_session_id: u32,
}

impl SimState {
    /// Revert an expired confirmed commit.
    fn expire_confirm(&mut self) {
        let expired = self
            .confirm
            .as_ref()
            .is_some_and(|w| Instant::now() >= w.deadline);
        if !expired {
            return;
        }
        if let Some(window) = self.confirm.take() {
            debug!("sim: confirmed commit expired, reverting running");
            self.candidate = window.backup.clone();
            self.running = window.backup;
        }
    }
}

/// Handle to one simulated device. Clones share the device.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedDevice {
    /// An IOS-XE device: NETCONF 1.1, candidate and writable running,
    /// confirmed commit, rollback-on-error, validate and startup.
    pub fn ios_xe(hostname: &str) -> Self {
        let capabilities = vec![
            BASE_1_0.to_string(),
            BASE_1_1.to_string(),
            capability::urn(capability::CANDIDATE),
            capability::urn(capability::WRITABLE_RUNNING),
            format!("{}{}:1.1", capability::URN_PREFIX, capability::CONFIRMED_COMMIT),
            capability::urn(capability::ROLLBACK_ON_ERROR),
            format!("{}{}:1.1", capability::URN_PREFIX, capability::VALIDATE),
            capability::urn(capability::STARTUP),
            "http://cisco.com/ns/yang/Cisco-IOS-XE-native?module=Cisco-IOS-XE-native".to_string(),
            "http://openconfig.net/yang/interfaces?module=openconfig-interfaces".to_string(),
        ];

        let mut data = Element::new("data");
        data.push(Element::new("native")).push(leaf("hostname", hostname));
        data.push(oc_interfaces(&[
            ("GigabitEthernet1", Some(("10.0.0.1", 24))),
            ("GigabitEthernet2", None),
            ("GigabitEthernet3", None),
        ]));
        Self::with_state(Vendor::IosXe, capabilities, data)
    }

    /// A Junos device: NETCONF 1.0 only, candidate, confirmed commit and
    /// validate. No rollback-on-error.
    pub fn junos(hostname: &str) -> Self {
        let capabilities = vec![
            BASE_1_0.to_string(),
            capability::urn(capability::CANDIDATE),
            capability::urn(capability::CONFIRMED_COMMIT),
            capability::urn(capability::VALIDATE),
            "http://xml.juniper.net/netconf/junos/1.0".to_string(),
        ];

        let mut data = Element::new("data");
        data.push(Element::new("system"))
            .push(Element::new("config"))
            .push(leaf("hostname", hostname));
        data.push(oc_interfaces(&[
            ("ge-0/0/0", Some(("192.0.2.1", 24))),
            ("ge-0/0/1", None),
            ("ge-0/0/2", None),
        ]));
        data.push(Element::new("configuration"));
        Self::with_state(Vendor::Junos, capabilities, data)
    }

    fn with_state(vendor: Vendor, capabilities: Vec<String>, running: Element) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                vendor,
                capabilities,
                candidate: running.clone(),
                running,
                confirm: None,
                locks: HashMap::new(),
                faults: VecDeque::new(),
                requests: Vec::new(),
                next_session_id: 1,
            })),
        }
    }

    /// Stop advertising every capability whose URI contains `:{name}:`.
    pub fn without_capability(self, name: &str) -> Self {
        let needle = format!(":{}:", name);
        self.lock().capabilities.retain(|c| !c.contains(&needle));
        self
    }

    pub fn vendor(&self) -> Vendor {
        self.lock().vendor
    }

    /// Queue a fault; faults are consumed one per RPC in order.
    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push_back(fault);
    }

    /// Every `<rpc>` document received so far, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// The running datastore as a `<data>` tree.
    pub fn running(&self) -> Element {
        let mut state = self.lock();
        state.expire_confirm();
        state.running.clone()
    }

    /// The candidate datastore as a `<data>` tree.
    pub fn candidate(&self) -> Element {
        let mut state = self.lock();
        state.expire_confirm();
        state.candidate.clone()
    }

    /// Hostname in the running datastore, native or OpenConfig.
    pub fn running_hostname(&self) -> Option<String> {
        crate::reply::to_hostname(&self.running())
    }

    /// Open a new session. The hello exchange is already done.
    pub fn connect(&self) -> SimTransport {
        let mut state = self.lock();
        let session_id = state.next_session_id;
        state.next_session_id += 1;
        let hello = ServerHello {
            session_id: Some(session_id),
            capabilities: state.capabilities.clone(),
        };
        let framing = if hello.supports_base_1_1() {
            Framing::Chunked
        } else {
            Framing::EndOfMessage
        };
        debug!("sim: session {} opened ({:?})", session_id, framing);

        SimTransport {
            device: self.clone(),
            hello,
            framing,
            closed: false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One session to a [`SimulatedDevice`].
#[derive(Debug)]
pub struct SimTransport {
    device: SimulatedDevice,
    hello: ServerHello,
    framing: Framing,
    closed: bool,
}

impl SimTransport {
    fn session_id(&self) -> u32 {
        self.hello.session_id.unwrap_or_default()
    }

    /// Frame and decode `reply` the way it would cross the wire.
    fn over_wire(&self, reply: &str) -> Result<String> {
        let mut decoder = FrameDecoder::new(self.framing);
        decoder.extend(&self.framing.encode(reply));
        decoder
            .next_message()?
            .ok_or_else(|| TransportError::Framing("incomplete simulated reply".to_string()).into())
    }
}

#[async_trait]
impl NetconfTransport for SimTransport {
    fn server_hello(&self) -> &ServerHello {
        &self.hello
    }

    async fn send_rpc(&mut self, message: &str) -> Result<String> {
        if self.closed {
            return Err(TransportError::Disconnected.into());
        }

        let fault = {
            let mut state = self.device.lock();
            state.requests.push(message.to_string());
            state.faults.pop_front()
        };

        let reply = match fault {
            Some(Fault::Disconnect) => {
                debug!("sim: session {} dropped", self.session_id());
                self.closed = true;
                return Err(TransportError::Disconnected.into());
            }
            Some(Fault::RpcError { tag, message: text }) => {
                let request = parse_request(message)?;
                error_reply(&request, &tag, &text)
            }
            Some(Fault::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                self.handle(message)?
            }
            None => self.handle(message)?,
        };

        trace!("sim: session {} reply: {}", self.session_id(), reply);
        self.over_wire(&reply)
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            let session_id = self.session_id();
            self.device.lock().locks.retain(|_, holder| *holder != session_id);
        }
        Ok(())
    }
}

impl SimTransport {
    fn handle(&mut self, message: &str) -> Result<String> {
        let request = parse_request(message)?;
        let Some(operation) = request.children().first() else {
            return Ok(error_reply(&request, "missing-element", "empty rpc"));
        };

        let session_id = self.session_id();
        let mut state = self.device.lock();
        state.expire_confirm();

        let body = match operation.name() {
            "get" => Ok(Some(data(&state.running, operation.find("filter"), false))),
            "get-config" => {
                let source = match datastore(operation, "source") {
                    Some("candidate") => &state.candidate,
                    _ => &state.running,
                };
                Ok(Some(data(source, operation.find("filter"), true)))
            }
            "edit-config" => edit_config(&mut state, operation).map(|_| None),
            "commit" => commit(&mut state, operation).map(|_| None),
            "cancel-commit" => match state.confirm.take() {
                Some(window) => {
                    state.candidate = window.backup.clone();
                    state.running = window.backup;
                    Ok(None)
                }
                None => Err(("invalid-value", "no confirmed commit pending".to_string())),
            },
            "discard-changes" => {
                state.candidate = state.running.clone();
                Ok(None)
            }
            "load-configuration" if operation.attribute("rollback") == Some("0") => {
                state.candidate = state.running.clone();
                Ok(Some(
                    Element::new("load-configuration-results").with_child(Element::new("ok")),
                ))
            }
            "get-zones-information" => Ok(Some(zones())),
            "lock" => {
                let target = datastore(operation, "target").unwrap_or("running").to_string();
                match state.locks.get(&target).copied() {
                    Some(holder) => Err(("lock-denied", format!("locked by session {}", holder))),
                    None => {
                        state.locks.insert(target, session_id);
                        Ok(None)
                    }
                }
            }
            "unlock" => {
                let target = datastore(operation, "target").unwrap_or("running").to_string();
                match state.locks.get(&target).copied() {
                    Some(holder) if holder == session_id => {
                        state.locks.remove(&target);
                        Ok(None)
                    }
                    _ => Err(("operation-failed", format!("{} is not locked by this session", target))),
                }
            }
            "validate" => Ok(None),
            "close-session" => {
                state.locks.retain(|_, holder| *holder != session_id);
                Ok(None)
            }
            other => Err(("operation-not-supported", format!("unknown operation '{}'", other))),
        };

        Ok(match body {
            Ok(body) => ok_reply(&request, body),
            Err((tag, text)) => error_reply(&request, tag, &text),
        })
    }
}

type RpcOutcome = std::result::Result<(), (&'static str, String)>;

fn edit_config(state: &mut SimState, operation: &Element) -> RpcOutcome {
    let target = datastore(operation, "target").unwrap_or("candidate");
    let advertised = match target {
        "running" => capability::WRITABLE_RUNNING,
        other => other,
    };
    let needle = format!(":{}:", advertised);
    if !state.capabilities.iter().any(|c| c.contains(&needle)) {
        return Err(("operation-not-supported", format!("{} is not writable", target)));
    }

    let Some(config) = operation.find("config") else {
        return Err(("missing-element", "edit-config without config".to_string()));
    };
    let store = match target {
        "running" => &mut state.running,
        _ => &mut state.candidate,
    };
    merge_children(store, config);
    Ok(())
}

fn commit(state: &mut SimState, operation: &Element) -> RpcOutcome {
    if operation.find("confirmed").is_some() {
        let timeout = operation
            .find_text("confirm-timeout")
            .and_then(|t| t.parse::<u64>().ok())
            .unwrap_or(600);
        let backup = match state.confirm.take() {
            Some(window) => window.backup,
            None => state.running.clone(),
        };
        state.confirm = Some(ConfirmWindow {
            backup,
            deadline: Instant::now() + Duration::from_secs(timeout),
        });
    } else {
        state.confirm = None;
    }
    state.running = state.candidate.clone();
    Ok(())
}

/// Merge the children of `source` into `target`.
fn merge_children(target: &mut Element, source: &Element) {
    for child in source.children() {
        let position = target
            .children()
            .iter()
            .position(|existing| same_node(existing, child, source));

        match child.attribute("operation") {
            Some("delete") | Some("remove") => {
                if let Some(i) = position {
                    target.children_mut().remove(i);
                }
            }
            Some("replace") => {
                let replacement = clean(child);
                match position {
                    Some(i) => target.children_mut()[i] = replacement,
                    None => {
                        target.push(replacement);
                    }
                }
            }
            _ => match position {
                Some(i) => {
                    let existing = &mut target.children_mut()[i];
                    if child.is_leaf() {
                        match child.text() {
                            Some(text) => existing.set_text(text),
                            None => existing.clear_text(),
                        }
                    } else {
                        merge_children(existing, child);
                    }
                }
                None => {
                    target.push(clean(child));
                }
            },
        }
    }
}

/// Whether `existing` is the datastore node `incoming` addresses.
fn same_node(existing: &Element, incoming: &Element, parent: &Element) -> bool {
    if existing.name() != incoming.name() {
        return false;
    }
    if let Some((key, value)) = list_key(incoming) {
        return list_key(existing) == Some((key, value));
    }
    // Leaf-list: several same-named leaves in one request
    if incoming.is_leaf() {
        let siblings = parent
            .children()
            .iter()
            .filter(|c| c.name() == incoming.name())
            .count();
        if siblings > 1 {
            return existing.text() == incoming.text();
        }
    }
    true
}

fn list_key(element: &Element) -> Option<(&str, &str)> {
    if matches!(element.name(), "config" | "state") {
        return None;
    }
    let first = element.children().first()?;
    if !first.is_leaf() || !LIST_KEYS.contains(&first.name()) {
        return None;
    }
    Some((first.name(), first.text()?))
}

/// Clone without edit-config operation attributes.
fn clean(element: &Element) -> Element {
    let mut copy = element.clone();
    strip_operations(&mut copy);
    copy
}

fn strip_operations(element: &mut Element) {
    element.remove_attribute("operation");
    for child in element.children_mut() {
        strip_operations(child);
    }
}

/// Subtree filtering of a `<data>` tree.
fn data(store: &Element, filter: Option<&Element>, config_only: bool) -> Element {
    let mut out = Element::new("data");
    match filter {
        None => {
            for child in store.children() {
                out.push(child.clone());
            }
        }
        Some(filter) => {
            for selector in filter.children() {
                for candidate in store.children().iter().filter(|c| c.name() == selector.name()) {
                    if let Some(selected) = select(candidate, selector) {
                        out.push(selected);
                    }
                }
            }
        }
    }
    if config_only {
        drop_state(&mut out);
    }
    out
}

fn select(node: &Element, selector: &Element) -> Option<Element> {
    if selector.is_leaf() {
        return match selector.text() {
            Some(text) if node.text() != Some(text) => None,
            _ => Some(node.clone()),
        };
    }

    let (matches, nested): (Vec<&Element>, Vec<&Element>) = selector
        .children()
        .iter()
        .partition(|s| s.is_leaf() && s.text().is_some());
    for content in &matches {
        let found = node
            .children()
            .iter()
            .any(|c| c.name() == content.name() && c.text() == content.text());
        if !found {
            return None;
        }
    }
    if nested.is_empty() {
        return Some(node.clone());
    }

    let mut out = Element::new(node.name());
    for content in &matches {
        if let Some(c) = node.children().iter().find(|c| c.name() == content.name()) {
            out.push(c.clone());
        }
    }
    let before = out.children().len();
    for selector in nested {
        for child in node.children().iter().filter(|c| c.name() == selector.name()) {
            if let Some(selected) = select(child, selector) {
                out.push(selected);
            }
        }
    }
    (out.children().len() > before).then_some(out)
}

fn drop_state(element: &mut Element) {
    element.retain_children(|c| c.name() != "state");
    for child in element.children_mut() {
        drop_state(child);
    }
}

fn datastore<'a>(operation: &'a Element, wrapper: &str) -> Option<&'a str> {
    operation
        .find(wrapper)
        .and_then(|w| w.children().first())
        .map(Element::name)
}

fn parse_request(message: &str) -> Result<Element> {
    Element::parse(message)
        .map(Element::stripped)
        .map_err(|e| TransportError::Framing(format!("simulated device got bad rpc: {}", e)).into())
}

fn reply_root(request: &Element) -> Element {
    let mut root = Element::new("rpc-reply");
    if let Some(id) = request.attribute("message-id") {
        root.set_attribute("message-id", id);
    }
    root
}

fn ok_reply(request: &Element, body: Option<Element>) -> String {
    let root = reply_root(request).with_child(body.unwrap_or_else(|| Element::new("ok")));
    root.to_xml()
}

fn error_reply(request: &Element, tag: &str, message: &str) -> String {
    let error = Element::new("rpc-error")
        .with_child(leaf("error-type", "application"))
        .with_child(leaf("error-tag", tag))
        .with_child(leaf("error-severity", "error"))
        .with_child(leaf("error-message", message));
    reply_root(request).with_child(error).to_xml()
}

fn leaf(name: &str, text: &str) -> Element {
    Element::new(name).with_text(text)
}

fn oc_interfaces(interfaces: &[(&str, Option<(&str, u8)>)]) -> Element {
    let mut root = Element::new("interfaces");
    for (name, address) in interfaces {
        let interface = root.push(Element::new("interface"));
        interface.push(leaf("name", name));
        interface.push(Element::new("config").with_child(leaf("name", name)));
        let state = interface.push(Element::new("state"));
        state.push(leaf("admin-status", "UP"));
        state.push(leaf("oper-status", if address.is_some() { "UP" } else { "DOWN" }));

        if let Some((ip, prefix)) = address {
            let subinterface = interface
                .push(Element::new("subinterfaces"))
                .push(Element::new("subinterface"));
            subinterface.push(leaf("index", "0"));
            let entry = subinterface
                .push(Element::new("ipv4"))
                .push(Element::new("addresses"))
                .push(Element::new("address"));
            entry.push(leaf("ip", ip));
            let config = entry.push(Element::new("config"));
            config.push(leaf("ip", ip));
            config.push(leaf("prefix-length", &prefix.to_string()));
        }
    }
    root
}

fn zones() -> Element {
    let mut info = Element::new("zones-information");
    for (zone, members) in [("trust", ["ge-0/0/1.0"]), ("untrust", ["ge-0/0/0.0"])] {
        let entry = info.push(Element::new("zones-security"));
        entry.push(leaf("zones-security-zonename", zone));
        let interfaces = entry.push(Element::new("zones-security-interfaces"));
        for member in members {
            interfaces.push(leaf("zones-security-interface-name", member));
        }
    }
    info
}

/// A set of simulated devices reachable by host name.
#[derive(Debug, Clone, Default)]
pub struct SimulatedLab {
    devices: Arc<Mutex<HashMap<String, SimulatedDevice>>>,
}

impl SimulatedLab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `device` reachable at `host`.
    pub fn add(&self, host: impl Into<String>, device: SimulatedDevice) {
        self.devices().insert(host.into(), device);
    }

    pub fn device(&self, host: &str) -> Option<SimulatedDevice> {
        self.devices().get(host).cloned()
    }

    fn devices(&self) -> MutexGuard<'_, HashMap<String, SimulatedDevice>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Connector for SimulatedLab {
    async fn connect(&self, spec: &DeviceSpec) -> Result<Box<dyn NetconfTransport>> {
        // a real handshake suspends at least once
        tokio::task::yield_now().await;
        let device = self.device(&spec.ssh.host).ok_or_else(|| TransportError::ConnectionFailed {
            host: spec.ssh.host.clone(),
            port: spec.ssh.port,
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "no simulated device"),
        })?;
        Ok(Box::new(device.connect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc(id: u32, body: &str) -> String {
        format!(
            r#"<rpc xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" message-id="{id}">{body}</rpc>"#
        )
    }

    #[tokio::test]
    async fn test_framing_follows_hello() {
        let ios = SimulatedDevice::ios_xe("r1").connect();
        assert_eq!(ios.framing, Framing::Chunked);
        let junos = SimulatedDevice::junos("vsrx").connect();
        assert_eq!(junos.framing, Framing::EndOfMessage);
        assert_ne!(ios.server_hello().session_id, None);
    }

    #[tokio::test]
    async fn test_merge_and_delete() {
        let device = SimulatedDevice::ios_xe("r1");
        let mut transport = device.connect();
        let edit = |body: &str| {
            rpc(
                1,
                &format!("<edit-config><target><running/></target><config>{body}</config></edit-config>"),
            )
        };

        let add = r#"<interfaces xmlns="http://openconfig.net/yang/interfaces"><interface><name>GigabitEthernet2</name><subinterfaces><subinterface><index>0</index><ipv4><addresses><address><ip>10.2.0.1</ip><config><ip>10.2.0.1</ip><prefix-length>30</prefix-length></config></address></addresses></ipv4></subinterface></subinterfaces></interface></interfaces>"#;
        let reply = transport.send_rpc(&edit(add)).await.unwrap();
        assert!(reply.contains("<ok/>"));

        let running = device.running();
        let interfaces = crate::reply::to_interfaces(&running);
        assert_eq!(interfaces.len(), 3, "merge keeps other list entries");
        assert_eq!(interfaces[1].subinterfaces[0].ipv4()[0].to_string(), "10.2.0.1/30");

        let delete = r#"<interfaces xmlns="http://openconfig.net/yang/interfaces" xmlns:nc="urn:ietf:params:xml:ns:netconf:base:1.0"><interface><name>GigabitEthernet2</name><subinterfaces><subinterface><index>0</index><ipv4><addresses><address nc:operation="delete"><ip>10.2.0.1</ip></address></addresses></ipv4></subinterface></subinterfaces></interface></interfaces>"#;
        transport.send_rpc(&edit(delete)).await.unwrap();
        transport.send_rpc(&edit(delete)).await.unwrap();
        let interfaces = crate::reply::to_interfaces(&device.running());
        assert!(interfaces[1].subinterfaces[0].ipv4().is_empty());
    }

    #[tokio::test]
    async fn test_subtree_filter() {
        let device = SimulatedDevice::ios_xe("r1");
        let mut transport = device.connect();
        let reply = transport
            .send_rpc(&rpc(
                7,
                "<get><filter type=\"subtree\"><interfaces><interface><name>GigabitEthernet1</name></interface></interfaces></filter></get>",
            ))
            .await
            .unwrap();
        let root = Element::parse(&reply).unwrap();
        assert_eq!(root.attribute("message-id"), Some("7"));
        assert_eq!(root.find_all("data/interfaces/interface").len(), 1);

        let reply = transport
            .send_rpc(&rpc(8, "<get-config><source><running/></source></get-config>"))
            .await
            .unwrap();
        assert!(!reply.contains("<state>"));
        assert!(reply.contains("<hostname>r1</hostname>"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_commit_reverts() {
        let device = SimulatedDevice::junos("vsrx");
        let mut transport = device.connect();
        transport
            .send_rpc(&rpc(
                1,
                "<edit-config><target><candidate/></target><config><system><config><hostname>edge</hostname></config></system></config></edit-config>",
            ))
            .await
            .unwrap();
        transport
            .send_rpc(&rpc(2, "<commit><confirmed/><confirm-timeout>60</confirm-timeout></commit>"))
            .await
            .unwrap();
        assert_eq!(device.running_hostname().as_deref(), Some("edge"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(device.running_hostname().as_deref(), Some("vsrx"));
        assert_eq!(crate::reply::to_hostname(&device.candidate()).as_deref(), Some("vsrx"));
    }

    #[tokio::test]
    async fn test_locks_and_unknown_operations() {
        let device = SimulatedDevice::ios_xe("r1");
        let mut a = device.connect();
        let mut b = device.connect();
        let lock = rpc(1, "<lock><target><candidate/></target></lock>");
        assert!(a.send_rpc(&lock).await.unwrap().contains("<ok/>"));
        assert!(b.send_rpc(&lock).await.unwrap().contains("lock-denied"));
        a.close().await.unwrap();
        assert!(b.send_rpc(&lock).await.unwrap().contains("<ok/>"));

        let reply = b.send_rpc(&rpc(2, "<reboot/>")).await.unwrap();
        assert!(reply.contains("operation-not-supported"));
    }

    #[tokio::test]
    async fn test_lab_connector() {
        let lab = SimulatedLab::new();
        lab.add("10.0.0.1", SimulatedDevice::ios_xe("r1"));
        assert!(lab.device("10.0.0.1").is_some());
        assert!(lab.device("10.0.0.2").is_none());
    }
}
