//! Process-wide configuration passed to the manager at boot.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::transport::HostKeyVerification;

/// Default NETCONF-over-SSH port (RFC 6242).
pub const DEFAULT_NETCONF_PORT: u16 = 830;

/// NETCONF datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datastore {
    #[default]
    Candidate,
    Running,
    Startup,
}

impl Datastore {
    /// Element name used inside `<target>` / `<source>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Datastore::Candidate => "candidate",
            Datastore::Running => "running",
            Datastore::Startup => "startup",
        }
    }
}

impl fmt::Display for Datastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manager configuration.
///
/// Loadable from TOML; every field has a default:
///
/// ```toml
/// target_datastore = "candidate"
/// template_dir = "templates"
/// rpc_timeout_secs = 30
/// connect_timeout_secs = 30
/// default_port = 830
/// host_key_verification = "accept-new"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Datastore every `edit-config` targets.
    pub target_datastore: Datastore,

    /// Root of the payload template tree.
    pub template_dir: PathBuf,

    /// Per-RPC deadline.
    pub rpc_timeout_secs: u64,

    /// SSH connect + hello deadline.
    pub connect_timeout_secs: u64,

    /// Port used when a device spec does not set one.
    pub default_port: u16,

    /// Host key verification mode for new sessions.
    pub host_key_verification: HostKeyVerification,

    /// Alternative known_hosts file.
    pub known_hosts_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_datastore: Datastore::Candidate,
            template_dir: PathBuf::from("templates"),
            rpc_timeout_secs: 30,
            connect_timeout_secs: 30,
            default_port: DEFAULT_NETCONF_PORT,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source).map_err(ConfigError::from)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Set the template root.
    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = dir.into();
        self
    }

    /// Set the edit-config target.
    pub fn with_target_datastore(mut self, datastore: Datastore) -> Self {
        self.target_datastore = datastore;
        self
    }

    /// Set the per-RPC deadline.
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
