//! # Connection Specs
//!
//! Parses `[password@]host:port` strings into a [`ConnectionSpec`].

use std::fmt;
use std::str::FromStr;

use crate::error::{ClientError, ClientResult};

/// Host used when a spec leaves the host empty.
pub const DEFAULT_HOST: &str = "localhost";

/// Store port used when a spec leaves the port out.
pub const DEFAULT_PORT: u16 = 6379;

/// Splits `s` at the first occurrence of `sep`.
///
/// Returns `(before, after, true)` when `sep` was found and
/// `(s, "", false)` otherwise.
pub fn two_fields<'a>(s: &'a str, sep: &str) -> (&'a str, &'a str, bool) {
    match s.split_once(sep) {
        Some((before, after)) => (before, after, true),
        None => (s, "", false),
    }
}

/// Where and how to connect to the store.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl ConnectionSpec {
    /// Parses `[password@]host:port`.
    ///
    /// The password is split off at the last `@`, so passwords may contain
    /// `@` themselves.
    pub fn parse(spec: &str) -> ClientResult<Self> {
        let (password, host_port) = match spec.rsplit_once('@') {
            Some((password, rest)) => (Some(password), rest),
            None => (None, spec),
        };

        let (host, port, _) = two_fields(host_port.trim(), ":");
        let host = match host.trim() {
            "" => DEFAULT_HOST.to_string(),
            host => host.to_string(),
        };
        let port = match port.trim() {
            "" => DEFAULT_PORT,
            port => port
                .parse::<u16>()
                .map_err(|_| ClientError::InvalidAddress(format!("bad port in {host_port:?}")))?,
        };

        Ok(ConnectionSpec {
            host,
            port,
            password: password.filter(|p| !p.is_empty()).map(str::to_string),
        })
    }

    /// `host:port` without the password.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ConnectionSpec {
    fn default() -> Self {
        ConnectionSpec {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            password: None,
        }
    }
}

impl FromStr for ConnectionSpec {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConnectionSpec::parse(s)
    }
}

// Keep passwords out of logs.
impl fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSpec")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}
