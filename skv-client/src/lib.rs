//! # Store Client
//!
//! Purpose: Provide a lightweight, synchronous client for Redis-compatible
//! stores: RESP2 framing, a bounded connection pool, and per-command
//! database selection for the typed collections built on top.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse TCP connections to avoid repeated connects.
//! 2. **Connection-Scoped State**: Authentication and the selected database
//!    live on a connection that one command holds exclusively.
//! 3. **Minimal Allocation**: Reuse buffers for RESP framing and parsing.
//! 4. **Protocol Clarity**: Encode/parse RESP2 explicitly for correctness.

mod address;
mod error;
mod pool;
mod resp;

pub use address::{two_fields, ConnectionSpec, DEFAULT_HOST, DEFAULT_PORT};
pub use error::{ClientError, ClientResult, ErrorKind};
pub use pool::{
    check_connection, check_connection_host, ConnectionPool, PoolConfig, PooledConnection,
};
pub use resp::{encode_command, read_response, RespValue};
