//! # Key/Value Collection
//!
//! String keys namespaced under the collection name: key `k` of collection
//! `name` is stored as `name:k`, which is what lets [`KeyValueStore::remove`]
//! find and drop every key the collection owns. The prefix is shared with a
//! [`HashMap`](crate::HashMap) of the same name, so removing one removes the
//! other's owners as well.

use std::time::Duration;

use skv_client::{ClientError, ClientResult, ConnectionPool};

use crate::capability::KeyValueStore;
use crate::handle::{expire_millis, Handle};
use crate::ttl::Ttl;

/// Namespace of independent string keys.
#[derive(Debug, Clone)]
pub struct KeyValue {
    handle: Handle,
}

impl KeyValue {
    /// Binds the collection `name` on the pool's default database.
    pub fn new(pool: &ConnectionPool, name: impl Into<String>) -> Self {
        KeyValue {
            handle: Handle::new(pool, name.into()),
        }
    }

    pub fn with_database(mut self, index: u32) -> Self {
        self.handle.set_database(index);
        self
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn database(&self) -> u32 {
        self.handle.database()
    }
}

impl KeyValueStore for KeyValue {
    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        let key = self.handle.element_key(key);
        self.handle
            .execute(&[b"SET", key.as_bytes(), value.as_bytes()])?
            .expect_ok()
    }

    fn get(&self, key: &str) -> ClientResult<String> {
        let key = self.handle.element_key(key);
        let reply = self.handle.execute(&[b"GET", key.as_bytes()])?;
        reply.into_string()?.ok_or_else(|| ClientError::not_found(key))
    }

    fn set_expire(&self, key: &str, value: &str, ttl: Duration) -> ClientResult<()> {
        let key = self.handle.element_key(key);
        let millis = expire_millis(ttl);
        self.handle
            .execute(&[
                b"SET",
                key.as_bytes(),
                value.as_bytes(),
                b"PX",
                millis.as_bytes(),
            ])?
            .expect_ok()
    }

    fn time_to_live(&self, key: &str) -> ClientResult<Ttl> {
        self.handle.time_to_live(&self.handle.element_key(key))
    }

    fn inc(&self, key: &str) -> ClientResult<String> {
        let key = self.handle.element_key(key);
        let value = self.handle.execute(&[b"INCR", key.as_bytes()])?.into_integer()?;
        Ok(value.to_string())
    }

    fn del(&self, key: &str) -> ClientResult<()> {
        self.handle.delete(&self.handle.element_key(key))
    }

    fn remove(&self) -> ClientResult<()> {
        self.handle.delete_elements()?;
        Ok(())
    }

    fn select_database(&mut self, index: u32) {
        self.handle.set_database(index);
    }
}
