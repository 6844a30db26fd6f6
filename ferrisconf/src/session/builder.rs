//! Builder for device connection specs.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::DeviceSpec;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{DeviceId, Vendor};
use crate::transport::config::{AuthMethod, SshConfig};

/// Builder for [`DeviceSpec`].
///
/// Anything left unset is taken from the [`Config`] passed to
/// [`build`](Self::build): port, connect timeout and host key policy.
///
/// # Example
///
/// ```rust,no_run
/// use ferrisconf::{Config, DeviceBuilder, Vendor};
///
/// # fn example() -> Result<(), ferrisconf::Error> {
/// let spec = DeviceBuilder::new("192.0.2.10")
///     .hostname("R1")
///     .vendor(Vendor::IosXe)
///     .username("admin")
///     .password("secret")
///     .build(&Config::default())?;
/// # Ok(())
/// # }
/// ```
pub struct DeviceBuilder {
    host: String,
    id: Option<DeviceId>,
    hostname: Option<String>,
    vendor: Option<Vendor>,
    port: Option<u16>,
    username: Option<String>,
    auth: AuthMethod,
    timeout: Option<Duration>,
}

impl DeviceBuilder {
    /// Create a builder for the device reachable at `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            id: None,
            hostname: None,
            vendor: None,
            port: None,
            username: None,
            auth: AuthMethod::None,
            timeout: None,
        }
    }

    /// Set the device id (default: the hostname).
    pub fn id(mut self, id: impl Into<DeviceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the hostname shown to the user (default: the host).
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = Some(vendor);
        self
    }

    /// Set the NETCONF port (default: from config, normally 830).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(SecretString::from(passphrase.into())),
        };
        self
    }

    /// Set the connect + hello timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the [`DeviceSpec`]. Does not connect.
    pub fn build(self, config: &Config) -> Result<DeviceSpec> {
        let vendor = self
            .vendor
            .ok_or_else(|| Error::invalid("vendor is required"))?;
        let username = self
            .username
            .ok_or_else(|| Error::invalid("username is required"))?;
        if self.host.trim().is_empty() {
            return Err(Error::invalid("host is empty"));
        }

        let hostname = self.hostname.unwrap_or_else(|| self.host.clone());
        let id = self.id.unwrap_or_else(|| DeviceId::new(hostname.clone()));

        let ssh = SshConfig {
            host: self.host,
            port: self.port.unwrap_or(config.default_port),
            username,
            auth: self.auth,
            timeout: self.timeout.unwrap_or_else(|| config.connect_timeout()),
            host_key_verification: config.host_key_verification,
            known_hosts_path: config.known_hosts_path.clone(),
        };

        Ok(DeviceSpec {
            id,
            hostname,
            vendor,
            ssh,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HostKeyVerification;

    #[test]
    fn test_defaults_from_config() {
        let config = Config {
            default_port: 2830,
            host_key_verification: HostKeyVerification::Strict,
            ..Config::default()
        };
        let spec = DeviceBuilder::new("192.0.2.1")
            .vendor(Vendor::Junos)
            .username("lab")
            .password("lab123")
            .build(&config)
            .unwrap();
        assert_eq!(spec.hostname, "192.0.2.1");
        assert_eq!(spec.id.as_str(), "192.0.2.1");
        assert_eq!(spec.ssh.port, 2830);
        assert_eq!(spec.ssh.timeout, config.connect_timeout());
        assert!(matches!(spec.ssh.host_key_verification, HostKeyVerification::Strict));
        assert!(matches!(spec.ssh.auth, AuthMethod::Password(_)));
    }

    #[test]
    fn test_explicit_values_win() {
        let spec = DeviceBuilder::new("192.0.2.1")
            .id("edge-1")
            .hostname("R1")
            .vendor(Vendor::IosXe)
            .port(830)
            .username("admin")
            .private_key("/tmp/id_ed25519")
            .timeout(Duration::from_secs(5))
            .build(&Config::default())
            .unwrap();
        assert_eq!(spec.id.as_str(), "edge-1");
        assert_eq!(spec.hostname, "R1");
        assert_eq!(spec.ssh.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_fields() {
        let config = Config::default();
        assert!(DeviceBuilder::new("h").username("u").build(&config).is_err());
        assert!(DeviceBuilder::new("h").vendor(Vendor::IosXe).build(&config).is_err());
        assert!(
            DeviceBuilder::new(" ")
                .vendor(Vendor::IosXe)
                .username("u")
                .build(&config)
                .is_err()
        );
    }
}
