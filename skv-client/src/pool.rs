//! # Connection Pool
//!
//! Purpose: Share a bounded set of store connections between every
//! collection built on the pool, and thread each command's database index
//! through the connection that carries it.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded set of reusable connections.
//! 2. **Minimal Locking**: Hold the mutex only while moving idle connections.
//! 3. **Fail Fast**: Exceeding the pool limit returns an error immediately.
//! 4. **Connection-Scoped Database**: The selected database is state of a
//!    single connection, and a connection is held exclusively for the whole
//!    `SELECT` + command exchange, so collections on different databases
//!    never observe each other's selection.

use std::collections::VecDeque;
use std::fmt;
use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::address::ConnectionSpec;
use crate::error::{ClientError, ClientResult, ErrorKind};
use crate::resp::{encode_command, read_response, RespValue};

/// Pool configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Server address, e.g. "localhost:6379".
    pub addr: String,
    /// Sent with `AUTH` on every new connection when set.
    pub password: Option<String>,
    /// Database new collections start on.
    pub database: u32,
    /// Maximum number of idle connections to keep.
    pub max_idle: usize,
    /// Maximum total connections (idle + in-use).
    pub max_total: usize,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
}

impl PoolConfig {
    /// Default limits pointed at the address and password of `spec`.
    pub fn from_spec(spec: &ConnectionSpec) -> Self {
        PoolConfig {
            addr: spec.addr(),
            password: spec.password.clone(),
            ..PoolConfig::default()
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            addr: ConnectionSpec::default().addr(),
            password: None,
            database: 0,
            max_idle: 8,
            max_total: 16,
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("addr", &self.addr)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("max_idle", &self.max_idle)
            .field("max_total", &self.max_total)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

struct PoolState {
    idle: VecDeque<Connection>,
    total: usize,
    closed: bool,
}

struct PoolInner {
    config: PoolConfig,
    default_database: AtomicU32,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn pop_idle(&self) -> ClientResult<Option<Connection>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ClientError::PoolClosed);
        }
        Ok(state.idle.pop_front())
    }

    fn try_reserve(&self) -> ClientResult<bool> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ClientError::PoolClosed);
        }
        if state.total >= self.config.max_total {
            return Ok(false);
        }
        state.total += 1;
        Ok(true)
    }

    fn release_slot(&self) {
        let mut state = self.state.lock();
        state.total = state.total.saturating_sub(1);
    }

    fn return_connection(&self, conn: Connection) {
        let mut state = self.state.lock();
        if !state.closed && state.idle.len() < self.config.max_idle {
            state.idle.push_back(conn);
        } else {
            state.total = state.total.saturating_sub(1);
        }
    }
}

/// Connection pool handle.
///
/// Cloning is cheap and every clone shares the same connections. Collections
/// keep a clone, so the pool lives as long as the last collection using it.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates a pool with the provided configuration. No I/O happens until
    /// the first command.
    pub fn new(config: PoolConfig) -> Self {
        let mut config = config;
        config.max_total = config.max_total.max(1);
        config.max_idle = config.max_idle.min(config.max_total);
        let state = PoolState {
            idle: VecDeque::with_capacity(config.max_idle),
            total: 0,
            closed: false,
        };
        ConnectionPool {
            inner: Arc::new(PoolInner {
                default_database: AtomicU32::new(config.database),
                config,
                state: Mutex::new(state),
            }),
        }
    }

    /// Pool for a store on `localhost:6379` without a password.
    pub fn local() -> Self {
        Self::new(PoolConfig::default())
    }

    /// Pool for a `[password@]host:port` spec.
    ///
    /// The pool is not verified: call [`ConnectionPool::ping`] to find out
    /// whether the store is reachable and accepts the credentials.
    pub fn from_spec(spec: &str) -> ClientResult<Self> {
        let spec = ConnectionSpec::parse(spec)?;
        Ok(Self::new(PoolConfig::from_spec(&spec)))
    }

    /// Pool for a `[password@]host:port` spec that has answered a `PING`.
    pub fn open(spec: &str) -> ClientResult<Self> {
        let pool = Self::from_spec(spec)?;
        pool.ping()?;
        Ok(pool)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Database new collections built on this pool start on.
    pub fn default_database(&self) -> u32 {
        self.inner.default_database.load(Ordering::Relaxed)
    }

    /// Checks `index` with the store and makes it the default database for
    /// collections created from now on. Existing collections are unaffected.
    pub fn select_database(&self, index: u32) -> ClientResult<()> {
        self.execute(index, &[b"PING"])?;
        self.inner.default_database.store(index, Ordering::Relaxed);
        debug!(database = index, addr = %self.inner.config.addr, "default database changed");
        Ok(())
    }

    /// Round trip that proves the store is reachable and accepts our
    /// credentials.
    pub fn ping(&self) -> ClientResult<()> {
        let mut conn = self.acquire()?;
        match conn.exec(&[b"PING"])? {
            RespValue::Simple(_) | RespValue::Bulk(Some(_)) => Ok(()),
            RespValue::Error(message) => Err(ClientError::from_server_message(&message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Runs one command against `database`.
    ///
    /// Error replies come back as `Err`; every other reply is returned for
    /// the caller to narrow.
    pub fn execute(&self, database: u32, args: &[&[u8]]) -> ClientResult<RespValue> {
        let mut conn = self.acquire()?;
        conn.select(database)?;
        match conn.exec(args)? {
            RespValue::Error(message) => Err(ClientError::from_server_message(&message)),
            reply => Ok(reply),
        }
    }

    /// Acquires a connection from the pool.
    pub fn acquire(&self) -> ClientResult<PooledConnection> {
        if let Some(conn) = self.inner.pop_idle()? {
            return Ok(PooledConnection::new(self.inner.clone(), conn));
        }

        if !self.inner.try_reserve()? {
            warn!(max_total = self.inner.config.max_total, "connection pool exhausted");
            return Err(ClientError::PoolExhausted {
                max_total: self.inner.config.max_total,
            });
        }

        match Connection::connect(&self.inner.config) {
            Ok(conn) => Ok(PooledConnection::new(self.inner.clone(), conn)),
            Err(err) => {
                self.inner.release_slot();
                Err(err)
            }
        }
    }

    /// Number of idle connections currently parked in the pool.
    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    /// Drops idle connections and refuses further checkouts. Connections in
    /// use are discarded when they are released.
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let drained = state.idle.len();
        state.idle.clear();
        state.total = state.total.saturating_sub(drained);
        debug!(addr = %self.inner.config.addr, drained, "connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.inner.config)
            .field("default_database", &self.default_database())
            .finish()
    }
}

/// Pings the store on `localhost:6379`.
pub fn check_connection() -> ClientResult<()> {
    check_connection_host(&ConnectionSpec::default().addr())
}

/// Pings the store described by a `[password@]host:port` spec over a fresh
/// connection.
pub fn check_connection_host(spec: &str) -> ClientResult<()> {
    let spec = ConnectionSpec::parse(spec)?;
    let config = PoolConfig {
        max_idle: 0,
        max_total: 1,
        ..PoolConfig::from_spec(&spec)
    };
    ConnectionPool::new(config).ping()
}

/// RAII wrapper returning a connection to the pool on drop.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    conn: Option<Connection>,
    valid: bool,
}

impl PooledConnection {
    fn new(pool: Arc<PoolInner>, conn: Connection) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
            valid: true,
        }
    }

    /// Executes a RESP command and returns the raw reply, error replies
    /// included.
    pub fn exec(&mut self, args: &[&[u8]]) -> ClientResult<RespValue> {
        self.with_conn(|conn| conn.exec(args))
    }

    /// Makes `database` the selected database of this connection.
    pub fn select(&mut self, database: u32) -> ClientResult<()> {
        self.with_conn(|conn| conn.select(database))
    }

    /// Database this connection currently has selected.
    pub fn database(&self) -> Option<u32> {
        self.conn.as_ref().map(|conn| conn.database)
    }

    fn with_conn<T>(
        &mut self,
        f: impl FnOnce(&mut Connection) -> ClientResult<T>,
    ) -> ClientResult<T> {
        let conn = self.conn.as_mut().ok_or(ClientError::PoolClosed)?;
        let result = f(conn);
        if let Err(err) = &result {
            // The stream may hold half a reply; never hand it out again.
            if err.kind() == ErrorKind::Transport {
                warn!(error = %err, "discarding broken connection");
                self.valid = false;
            }
        }
        result
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => return,
        };

        if self.valid {
            self.pool.return_connection(conn);
        } else {
            self.pool.release_slot();
        }
    }
}

/// Single TCP connection with reusable buffers and its selected database.
pub struct Connection {
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
    database: u32,
}

impl Connection {
    fn connect(config: &PoolConfig) -> ClientResult<Self> {
        let stream = connect_stream(config)?;
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;

        let mut conn = Connection {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
            database: 0,
        };
        debug!(addr = %config.addr, "connection opened");

        if let Some(password) = &config.password {
            match conn.exec(&[b"AUTH", password.as_bytes()])? {
                RespValue::Simple(_) => debug!(addr = %config.addr, "authenticated"),
                RespValue::Error(message) => {
                    let text = String::from_utf8_lossy(&message).into_owned();
                    warn!(addr = %config.addr, reply = %text, "authentication rejected");
                    return Err(ClientError::Auth(text));
                }
                _ => return Err(ClientError::UnexpectedResponse),
            }
        }
        Ok(conn)
    }

    fn select(&mut self, database: u32) -> ClientResult<()> {
        if self.database == database {
            return Ok(());
        }
        let index = database.to_string();
        match self.exec(&[b"SELECT", index.as_bytes()])? {
            RespValue::Simple(_) => {
                trace!(from = self.database, to = database, "database selected");
                self.database = database;
                Ok(())
            }
            RespValue::Error(message) => Err(ClientError::from_server_message(&message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    fn exec(&mut self, args: &[&[u8]]) -> ClientResult<RespValue> {
        if let Some(name) = args.first() {
            trace!(command = %String::from_utf8_lossy(name), argc = args.len(), "exec");
        }
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_response(&mut self.reader, &mut self.line_buf)
    }
}

fn connect_stream(config: &PoolConfig) -> ClientResult<TcpStream> {
    let addrs = config
        .addr
        .to_socket_addrs()
        .map_err(|err| ClientError::InvalidAddress(format!("{}: {err}", config.addr)))?;

    let mut last_err = None;
    for addr in addrs {
        let attempt = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }

    Err(match last_err {
        Some(source) => ClientError::Connect {
            addr: config.addr.clone(),
            source,
        },
        None => ClientError::InvalidAddress(format!("{} resolved to no addresses", config.addr)),
    })
}
