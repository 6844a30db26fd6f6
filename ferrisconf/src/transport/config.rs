//! Endpoint settings for one NETCONF-over-SSH session.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// What to do with the server's host key (OpenSSH `StrictHostKeyChecking`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyVerification {
    /// Host must already be in known_hosts with the same key.
    Strict,
    /// Unknown hosts are learned; a changed key is still refused.
    #[default]
    AcceptNew,
    /// No check at all. Lab devices only.
    Disabled,
}

impl HostKeyVerification {
    /// Whether known_hosts is consulted.
    pub fn checks_known_hosts(self) -> bool {
        self != HostKeyVerification::Disabled
    }

    /// Whether an unknown host is accepted and written to known_hosts.
    pub fn learns_unknown_hosts(self) -> bool {
        self == HostKeyVerification::AcceptNew
    }
}

/// Where and how to reach a device's `netconf` subsystem.
#[derive(Debug)]
pub struct SshConfig {
    pub host: String,
    /// 830 unless the device spec says otherwise.
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
    /// Deadline for TCP connect plus the hello exchange.
    pub timeout: Duration,
    pub host_key_verification: HostKeyVerification,
    /// known_hosts override; `~/.ssh/known_hosts` when unset.
    pub known_hosts_path: Option<PathBuf>,
}

impl SshConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Credentials presented to the SSH server.
#[derive(Debug)]
pub enum AuthMethod {
    /// `none` method; simulated and test servers only.
    None,
    Password(SecretString),
    PrivateKey {
        path: PathBuf,
        /// For encrypted key files.
        passphrase: Option<SecretString>,
    },
}

impl AuthMethod {
    /// SSH method name as used on the wire.
    pub fn method_name(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::Password(_) => "password",
            AuthMethod::PrivateKey { .. } => "publickey",
        }
    }
}
