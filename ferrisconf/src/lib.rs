//! # Ferrisconf
//!
//! Async NETCONF session and configuration transaction manager for network
//! device automation.
//!
//! Ferrisconf composes configuration for Cisco IOS-XE and Juniper Junos
//! devices over NETCONF. One user-level operation (set a hostname, add an
//! interface address, configure OSPF or an IPSec tunnel) is mapped onto the
//! payload each vendor understands, sent as `<edit-config>` to the
//! candidate datastore and recorded as a pending change until it is
//! committed or discarded.
//!
//! ## Features
//!
//! - Async NETCONF 1.0/1.1 sessions over SSH via russh
//! - Template-driven payloads for IOS-XE native, Junos and OpenConfig models
//! - Namespace-free reply normalization into typed records
//! - Plain and confirmed commits across many devices, with per-device results
//! - Pending-change ledger with subscribe/unsubscribe observers
//! - Simulated IOS-XE and Junos devices for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferrisconf::{CommitOptions, Config, DeviceBuilder, NetconfManager, OspfConfig, Vendor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferrisconf::Error> {
//!     let config = Config::load("ferrisconf.toml")?;
//!     let manager = NetconfManager::new(config.clone())?;
//!
//!     let r1 = manager
//!         .connect(
//!             DeviceBuilder::new("192.0.2.10")
//!                 .hostname("R1")
//!                 .vendor(Vendor::IosXe)
//!                 .username("admin")
//!                 .password("secret")
//!                 .build(&config)?,
//!         )
//!         .await?;
//!
//!     let ospf = OspfConfig::new("0.0.0.0")
//!         .with_reference_bandwidth(10_000)
//!         .with_network("GigabitEthernet2", "10.1.0.0/24".parse().unwrap());
//!     manager.configure_ospf(&r1, &ospf).await?;
//!
//!     for (_, result) in manager.commit(&[r1], CommitOptions::default()).await {
//!         result?;
//!     }
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ledger;
pub mod manager;
pub mod model;
pub mod payload;
pub mod reply;
pub mod session;
pub mod sim;
pub mod template;
pub mod topology;
pub mod transaction;
pub mod transport;
pub mod vendors;
pub mod xml;

// Re-export main types for convenience
pub use config::{Config, Datastore};
pub use error::{Error, ErrorKind, Result};
pub use ledger::{ChangeStatus, EventKind, Ledger, LedgerEvent, PendingChange, Subscription};
pub use manager::NetconfManager;
pub use model::{
    DeviceId, IkeParameters, Interface, IpsecParameters, OspfConfig, PeerParameters, Switchport,
    Vendor, Vlan, VlanId,
};
pub use session::{CommitOptions, DeviceBuilder, DeviceSession, DeviceSpec, SessionState};
pub use topology::{Link, Port};
pub use transaction::{ApplyOutcome, ConfirmStatus};
pub use transport::{AuthMethod, SshConfig};
