//! NETCONF transport layer.
//!
//! This module provides the SSH connection management (russh), the
//! NETCONF 1.0/1.1 message framing and the `<hello>` exchange. Sessions
//! talk to a [`NetconfTransport`] so the same session code runs over SSH
//! or against a simulated device.

pub mod config;
pub mod framing;
pub mod hello;
mod ssh;

use async_trait::async_trait;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use framing::{FrameDecoder, Framing};
pub use hello::{BASE_1_0, BASE_1_1, ServerHello};
pub use ssh::SshNetconfTransport;

use crate::error::Result;
use crate::session::DeviceSpec;

/// A connected NETCONF message pipe.
///
/// Implementations have already completed the hello exchange when they
/// are handed to a session. One RPC is in flight at a time.
#[async_trait]
pub trait NetconfTransport: Send {
    /// The server hello received during session setup.
    fn server_hello(&self) -> &ServerHello;

    /// Send one `<rpc>` document and wait for the matching reply document.
    async fn send_rpc(&mut self, message: &str) -> Result<String>;

    /// Close the underlying connection. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// Factory opening transports for device specs.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, spec: &DeviceSpec) -> Result<Box<dyn NetconfTransport>>;
}

/// Connector opening real SSH sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, spec: &DeviceSpec) -> Result<Box<dyn NetconfTransport>> {
        let transport = SshNetconfTransport::connect(&spec.ssh).await?;
        Ok(Box::new(transport))
    }
}
