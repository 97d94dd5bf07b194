//! # Typed Store Collections
//!
//! Purpose: Present lists, key/value namespaces, sets and hash maps as typed
//! collections over a Redis-compatible store, each bound to a shared
//! [`ConnectionPool`] and its own database index.
//!
//! ## Usage
//!
//! ```no_run
//! use skv_collections::{ConnectionPool, KeyValue, KeyValueStore};
//!
//! let pool = ConnectionPool::open("localhost:6379")?;
//! let mut kv = KeyValue::new(&pool, "session");
//! kv.select_database(1);
//! kv.set("token", "123abc")?;
//! assert_eq!(kv.get("token")?, "123abc");
//! # Ok::<(), skv_collections::ClientError>(())
//! ```
//!
//! ## Design Principles
//! 1. **Facade Pattern**: Collections hide key layout and command choice.
//! 2. **Strategy Pattern**: Callers depend on the capability traits, not the
//!    concrete collections.
//! 3. **Per-Command Database**: The database index travels with every
//!    command, so collections sharing a pool never disturb each other.

mod capability;
mod creator;
mod handle;
mod hashmap;
mod keyvalue;
mod list;
mod set;
mod ttl;

pub use capability::{CollectionFactory, HashMapStore, KeyValueStore, ListStore, SetStore};
pub use creator::Creator;
pub use hashmap::HashMap;
pub use keyvalue::KeyValue;
pub use list::List;
pub use set::Set;
pub use ttl::Ttl;

pub use skv_client::{ClientError, ClientResult, ConnectionPool, ErrorKind, PoolConfig};
