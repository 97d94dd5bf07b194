//! # Client Errors
//!
//! Purpose: One error type for everything that can go wrong between a
//! collection call and the store reply, grouped into coarse kinds so callers
//! can branch on "missing" versus "connection" versus "transport".

use std::io;
use std::string::FromUtf8Error;

/// Result type for the sync client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Coarse classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Host unreachable, bad address, authentication failure or pool limits.
    Connection,
    /// Key, field or member absent (or expired).
    NotFound,
    /// The stored value has the wrong type for the operation.
    TypeMismatch,
    /// I/O failure, timeout or malformed reply during an in-flight call.
    Transport,
    /// Any other error reply from the store.
    Server,
}

/// Errors surfaced by the sync client and the collections built on it.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// TCP connection to the store could not be established.
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The store rejected the credentials, or requires credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Connection spec or address could not be parsed or resolved.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Pool is at capacity and no idle connections are available.
    #[error("connection pool exhausted (max size: {max_total})")]
    PoolExhausted { max_total: usize },

    /// The pool was closed explicitly.
    #[error("connection pool closed")]
    PoolClosed,

    /// Key (or hash field) does not exist.
    #[error("not found: {}", display_location(.key, .field.as_deref()))]
    NotFound { key: String, field: Option<String> },

    /// Operation applied to a value of the wrong kind.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Network or IO failure while reading/writing.
    #[error("io error: {0}")]
    Io(io::Error),

    /// A read or write deadline elapsed.
    #[error("read tcp: i/o timeout")]
    Timeout,

    /// RESP2 framing or parse error.
    #[error("protocol error")]
    Protocol,

    /// Response type did not match the expected command response.
    #[error("unexpected response")]
    UnexpectedResponse,

    /// A bulk reply was not valid UTF-8.
    #[error("reply is not valid utf-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// Store returned an error reply not covered by a more specific variant.
    #[error("server error: {0}")]
    Server(String),
}

fn display_location(key: &str, field: Option<&str>) -> String {
    match field {
        Some(field) => format!("{key} (field {field})"),
        None => key.to_string(),
    }
}

impl ClientError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Connect { .. }
            | ClientError::Auth(_)
            | ClientError::InvalidAddress(_)
            | ClientError::PoolExhausted { .. }
            | ClientError::PoolClosed => ErrorKind::Connection,
            ClientError::NotFound { .. } => ErrorKind::NotFound,
            ClientError::TypeMismatch(_) => ErrorKind::TypeMismatch,
            ClientError::Io(_)
            | ClientError::Timeout
            | ClientError::Protocol
            | ClientError::UnexpectedResponse
            | ClientError::Utf8(_) => ErrorKind::Transport,
            ClientError::Server(_) => ErrorKind::Server,
        }
    }

    /// Returns true for read/write deadlines and connect timeouts.
    pub fn is_timeout(&self) -> bool {
        match self {
            ClientError::Timeout => true,
            ClientError::Connect { source, .. } => source.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        ClientError::NotFound {
            key: key.into(),
            field: None,
        }
    }

    pub fn field_not_found(key: impl Into<String>, field: impl Into<String>) -> Self {
        ClientError::NotFound {
            key: key.into(),
            field: Some(field.into()),
        }
    }

    /// Classifies an error reply from the store.
    pub fn from_server_message(message: &[u8]) -> Self {
        let text = String::from_utf8_lossy(message).into_owned();
        let code = text.split_whitespace().next().unwrap_or_default().to_string();
        match code.as_str() {
            "NOAUTH" | "WRONGPASS" => ClientError::Auth(text),
            "WRONGTYPE" => ClientError::TypeMismatch(text),
            _ if text.contains("invalid password")
                || text.contains("without any password configured")
                || text.contains("invalid username-password") =>
            {
                ClientError::Auth(text)
            }
            _ if text.contains("not an integer") => ClientError::TypeMismatch(text),
            _ => ClientError::Server(text),
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        // Socket deadlines surface as WouldBlock on Unix and TimedOut on Windows.
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ClientError::Timeout,
            _ => ClientError::Io(err),
        }
    }
}
