//! NETCONF over SSH using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, trace, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;

use super::NetconfTransport;
use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use super::framing::{FrameDecoder, Framing};
use super::hello::{ServerHello, client_hello};
use crate::error::{Result, TransportError};

/// SSH subsystem name (RFC 6242).
const NETCONF_SUBSYSTEM: &str = "netconf";

/// NETCONF session running on an SSH `netconf` subsystem channel.
pub struct SshNetconfTransport {
    session: Handle<SshHandler>,
    channel: Channel<Msg>,
    framing: Framing,
    decoder: FrameDecoder,
    hello: ServerHello,
    host: String,
    closed: bool,
}

impl SshNetconfTransport {
    /// Connect, authenticate, open the `netconf` subsystem and exchange hellos.
    pub async fn connect(config: &SshConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            ..Default::default()
        });

        let rejection = Arc::new(Mutex::new(None));
        let handler = SshHandler {
            known_hosts: KnownHosts {
                host: config.host.clone(),
                port: config.port,
                path: config.known_hosts_path.clone(),
            },
            policy: config.host_key_verification,
            rejection: rejection.clone(),
        };

        debug!("Connecting to {}", config.socket_addr());
        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            let refused = rejection.lock().ok().and_then(|mut slot| slot.take());
            refused.unwrap_or(TransportError::Ssh(e))
        })?;

        Self::authenticate(&mut session, config).await?;

        let channel = Self::open_subsystem(&session).await?;

        let mut transport = Self {
            session,
            channel,
            framing: Framing::EndOfMessage,
            decoder: FrameDecoder::new(Framing::EndOfMessage),
            hello: ServerHello {
                session_id: None,
                capabilities: Vec::new(),
            },
            host: config.host.clone(),
            closed: false,
        };

        tokio::time::timeout(config.timeout, transport.exchange_hello())
            .await
            .map_err(|_| TransportError::Timeout(config.timeout))??;

        Ok(transport)
    }

    /// Open a session channel and request the netconf subsystem.
    async fn open_subsystem(session: &Handle<SshHandler>) -> Result<Channel<Msg>> {
        let mut channel = session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_subsystem(true, NETCONF_SUBSYSTEM)
            .await
            .map_err(TransportError::Ssh)?;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Success) => break,
                Some(ChannelMsg::Failure) => {
                    return Err(TransportError::SubsystemRefused(NETCONF_SUBSYSTEM.to_string()).into());
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(TransportError::Disconnected.into());
                }
                Some(_) => {}
            }
        }

        Ok(channel)
    }

    async fn exchange_hello(&mut self) -> Result<()> {
        self.write_message(&client_hello()).await?;
        let message = self.read_message().await?;
        self.hello = ServerHello::parse(&message)?;

        if self.hello.supports_base_1_1() {
            debug!("{}: both peers speak base:1.1, switching to chunked framing", self.host);
            self.framing = Framing::Chunked;
            self.decoder.set_framing(Framing::Chunked);
        }
        debug!(
            "{}: NETCONF session {:?} with {} capabilities",
            self.host,
            self.hello.session_id,
            self.hello.capabilities.len()
        );
        Ok(())
    }

    async fn write_message(&mut self, message: &str) -> Result<()> {
        trace!("{} <<< {}", self.host, message);
        let framed = self.framing.encode(message);
        self.channel
            .data(&framed[..])
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }

    async fn read_message(&mut self) -> Result<String> {
        loop {
            if let Some(message) = self.decoder.next_message()? {
                trace!("{} >>> {}", self.host, message);
                return Ok(message);
            }

            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => self.decoder.extend(&data),
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    warn!(
                        "{}: stderr on netconf channel: {}",
                        self.host,
                        String::from_utf8_lossy(&data)
                    );
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    self.closed = true;
                    return Err(TransportError::Disconnected.into());
                }
                Some(_) => {}
            }
        }
    }

    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let user = config.username.as_str();
        debug!("{}: authenticating {} via {}", config.host, user, config.auth.method_name());
        let outcome = match &config.auth {
            AuthMethod::None => session.authenticate_none(user).await,
            AuthMethod::Password(password) => {
                session.authenticate_password(user, password.expose_secret()).await
            }
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(format!("{}: {}", path.display(), e)))?;
                // RSA keys sign with the strongest hash the server offers
                let hash = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();
                session
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash))
                    .await
            }
        };

        if outcome.map_err(TransportError::Ssh)?.success() {
            Ok(())
        } else {
            Err(TransportError::AuthenticationFailed {
                user: user.to_string(),
            }
            .into())
        }
    }
}

#[async_trait]
impl NetconfTransport for SshNetconfTransport {
    fn server_hello(&self) -> &ServerHello {
        &self.hello
    }

    async fn send_rpc(&mut self, message: &str) -> Result<String> {
        if self.closed {
            return Err(TransportError::Disconnected.into());
        }
        self.write_message(message).await?;
        self.read_message().await
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(e) = self.channel.eof().await {
            debug!("{}: eof on closing channel failed: {}", self.host, e);
        }
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// known_hosts entry lookup for one endpoint.
struct KnownHosts {
    host: String,
    port: u16,
    path: Option<PathBuf>,
}

impl KnownHosts {
    /// `Ok(true)` on a match, `Ok(false)` when the host has no entry.
    fn contains(&self, key: &PublicKey) -> std::result::Result<bool, TransportError> {
        let checked = match &self.path {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, key),
        };
        checked.map_err(|e| match e {
            russh::keys::Error::KeyChanged { line } => TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            },
            other => TransportError::KnownHosts(other.to_string()),
        })
    }

    fn learn(&self, key: &PublicKey) -> std::result::Result<(), TransportError> {
        let learned = match &self.path {
            Some(path) => russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, key, path),
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, key),
        };
        learned.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    /// Apply `policy` to the presented key.
    fn verify(&self, policy: HostKeyVerification, key: &PublicKey) -> std::result::Result<(), TransportError> {
        if !policy.checks_known_hosts() {
            return Ok(());
        }
        if self.contains(key)? {
            return Ok(());
        }
        if !policy.learns_unknown_hosts() {
            return Err(TransportError::HostKeyUnknown {
                host: self.host.clone(),
                port: self.port,
            });
        }
        if let Err(e) = self.learn(key) {
            warn!("{}: could not record host key: {}", self.host, e);
        }
        Ok(())
    }
}

/// russh callbacks for a NETCONF client.
struct SshHandler {
    known_hosts: KnownHosts,
    policy: HostKeyVerification,
    /// Why the host key was refused; russh itself only reports UnknownKey.
    rejection: Arc<Mutex<Option<TransportError>>>,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.known_hosts.verify(self.policy, server_public_key) {
            Ok(()) => Ok(true),
            Err(e) => {
                if let Ok(mut slot) = self.rejection.lock() {
                    *slot = Some(e);
                }
                Ok(false)
            }
        }
    }
}
