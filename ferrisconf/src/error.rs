//! Error types for ferrisconf.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for ferrisconf operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// NETCONF `<rpc-error>` returned by the server
    #[error("Protocol error: {0}")]
    Protocol(RpcErrors),

    /// Template store errors
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Reply could not be parsed
    #[error("Reply error: {0}")]
    Reply(#[from] ReplyError),

    /// Builder input violated a domain invariant
    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A facade operation failed on a specific device
    #[error("{operation} failed on {hostname}: {source}")]
    Operation {
        hostname: String,
        operation: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Shorthand for [`Error::InvalidParameters`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidParameters {
            message: message.into(),
        }
    }

    /// Classify this error into one of the user-facing kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(e) => e.kind(),
            Error::Session(e) => e.kind(),
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Template(TemplateError::NotFound { .. }) => ErrorKind::TemplateNotFound,
            Error::Template(_) => ErrorKind::TemplateParse,
            Error::Reply(_) => ErrorKind::ReplyParse,
            Error::InvalidParameters { .. } => ErrorKind::InvalidParameters,
            Error::Config(_) => ErrorKind::Config,
            Error::Operation { source, .. } => source.kind(),
        }
    }

    /// Whether this error leaves the session unusable.
    pub fn breaks_session(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Operation { source, .. } => source.breaks_session(),
            _ => false,
        }
    }
}

/// User-facing error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Auth,
    Timeout,
    Protocol,
    TemplateNotFound,
    TemplateParse,
    InvalidParameters,
    SessionClosed,
    ReplyParse,
    Unsupported,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "TransportError",
            ErrorKind::Auth => "AuthError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Protocol => "ProtocolError",
            ErrorKind::TemplateNotFound => "TemplateNotFound",
            ErrorKind::TemplateParse => "TemplateParseError",
            ErrorKind::InvalidParameters => "InvalidParameters",
            ErrorKind::SessionClosed => "SessionClosed",
            ErrorKind::ReplyParse => "ReplyParseError",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::Config => "ConfigError",
        };
        f.write_str(name)
    }
}

/// Transport layer errors (SSH connection, authentication, framing).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key not present in known_hosts (strict mode)
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// The server refused the netconf subsystem
    #[error("Server refused the '{0}' subsystem")]
    SubsystemRefused(String),

    /// Malformed NETCONF framing
    #[error("Framing error: {0}")]
    Framing(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    fn kind(&self) -> ErrorKind {
        match self {
            TransportError::AuthenticationFailed { .. } | TransportError::Key(_) => ErrorKind::Auth,
            TransportError::Timeout(_) => ErrorKind::Timeout,
            TransportError::Framing(_) => ErrorKind::Protocol,
            _ => ErrorKind::Transport,
        }
    }
}

/// Session lifecycle errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Operation attempted after `close()`
    #[error("Session closed")]
    Closed,

    /// A transport failure left the session unusable
    #[error("Session broken - reconnect required")]
    Broken,

    /// The device is not managed by this manager
    #[error("Unknown device '{0}'")]
    UnknownDevice(String),

    /// A device with this identifier is already connected
    #[error("Device '{0}' already connected")]
    AlreadyConnected(String),

    /// The server did not advertise a capability the operation needs
    #[error("Server lacks capability '{capability}' required for {operation}")]
    MissingCapability {
        capability: String,
        operation: String,
    },

    /// The operation has no mapping for this vendor
    #[error("'{operation}' is not supported on {vendor}")]
    Unsupported { operation: String, vendor: String },

    /// No confirmed-commit window is open for the device
    #[error("No confirmed commit is pending on '{0}'")]
    NoConfirmWindow(String),

    /// The confirmed-commit window elapsed before confirmation
    #[error("Confirmed commit window on '{0}' expired")]
    ConfirmWindowExpired(String),

    /// A confirmed commit is live; confirm or cancel it first
    #[error("Confirmed commit on '{0}' is still open; confirm or cancel it first")]
    ConfirmWindowOpen(String),

    /// The server hello could not be understood
    #[error("Invalid server hello: {0}")]
    InvalidHello(String),
}

impl SessionError {
    fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Closed | SessionError::Broken | SessionError::UnknownDevice(_) => {
                ErrorKind::SessionClosed
            }
            SessionError::AlreadyConnected(_) => ErrorKind::InvalidParameters,
            SessionError::InvalidHello(_) => ErrorKind::Protocol,
            _ => ErrorKind::Unsupported,
        }
    }
}

/// A single `<rpc-error>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub error_type: String,
    pub tag: String,
    pub severity: String,
    pub message: Option<String>,
    pub path: Option<String>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.tag, self.error_type)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        if let Some(path) = &self.path {
            write!(f, " at {}", path)?;
        }
        Ok(())
    }
}

/// All `<rpc-error>` elements of one reply, plus the raw reply text.
#[derive(Debug, Clone)]
pub struct RpcErrors {
    pub errors: Vec<RpcError>,
    pub raw_reply: String,
}

impl fmt::Display for RpcErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("; "))
    }
}

/// Template store errors.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// No template file for the requested key
    #[error("Template not found: {key}")]
    NotFound { key: String },

    /// Template file is not well-formed XML
    #[error("Failed to parse template {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Template file could not be read
    #[error("Failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A template is missing the element a builder injects into
    #[error("Template {key} has no element at '{path}'")]
    MissingElement { key: String, path: String },
}

/// Reply parsing errors.
#[derive(Error, Debug)]
pub enum ReplyError {
    /// Reply is not well-formed XML
    #[error("Malformed reply: {0}")]
    Malformed(String),

    /// Reply root is not an `<rpc-reply>`
    #[error("Unexpected reply root <{0}>")]
    UnexpectedRoot(String),
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for [`Config`](crate::config::Config)
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type alias using ferrisconf's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            Error::from(TransportError::Timeout(std::time::Duration::from_secs(1))).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            Error::from(TransportError::AuthenticationFailed {
                user: "admin".into()
            })
            .kind(),
            ErrorKind::Auth
        );
        assert_eq!(Error::from(SessionError::Closed).kind(), ErrorKind::SessionClosed);
        assert_eq!(
            Error::from(TemplateError::NotFound { key: "x".into() }).kind(),
            ErrorKind::TemplateNotFound
        );
        assert_eq!(Error::invalid("bad").kind(), ErrorKind::InvalidParameters);
    }

    #[test]
    fn test_operation_error_keeps_inner_kind() {
        let err = Error::Operation {
            hostname: "R1".into(),
            operation: "commit".into(),
            source: Box::new(Error::from(SessionError::Broken)),
        };
        assert_eq!(err.kind(), ErrorKind::SessionClosed);
        assert!(err.to_string().contains("R1"));
        assert_eq!(ErrorKind::SessionClosed.to_string(), "SessionClosed");
    }

    #[test]
    fn test_breaks_session() {
        assert!(Error::from(TransportError::Disconnected).breaks_session());
        assert!(!Error::invalid("x").breaks_session());
        let protocol = Error::Protocol(RpcErrors {
            errors: vec![],
            raw_reply: String::new(),
        });
        assert!(!protocol.breaks_session());
    }
}
