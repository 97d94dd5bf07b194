//! # Hash Map Collection
//!
//! Each owner id is one store hash named `name:owner`; its fields are the
//! hash fields. Owners are discovered by scanning the `name:` prefix, so
//! another collection whose keys start with the same prefix would be seen
//! as owners too.

use std::time::Duration;

use skv_client::{ClientError, ClientResult, ConnectionPool};

use crate::capability::HashMapStore;
use crate::handle::{expire_millis, Handle};
use crate::ttl::Ttl;

/// Field/value objects grouped by owner id.
#[derive(Debug, Clone)]
pub struct HashMap {
    handle: Handle,
}

impl HashMap {
    /// Binds the hash map `name` on the pool's default database.
    pub fn new(pool: &ConnectionPool, name: impl Into<String>) -> Self {
        HashMap {
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

impl HashMapStore for HashMap {
    fn set(&self, owner: &str, field: &str, value: &str) -> ClientResult<()> {
        let key = self.handle.element_key(owner);
        self.handle
            .execute(&[b"HSET", key.as_bytes(), field.as_bytes(), value.as_bytes()])?
            .into_integer()?;
        Ok(())
    }

    fn set_expire(
        &self,
        owner: &str,
        field: &str,
        value: &str,
        ttl: Duration,
    ) -> ClientResult<()> {
        self.set(owner, field, value)?;
        let key = self.handle.element_key(owner);
        let millis = expire_millis(ttl);
        self.handle
            .execute(&[b"PEXPIRE", key.as_bytes(), millis.as_bytes()])?
            .into_integer()?;
        Ok(())
    }

    fn get(&self, owner: &str, field: &str) -> ClientResult<String> {
        let key = self.handle.element_key(owner);
        let reply = self
            .handle
            .execute(&[b"HGET", key.as_bytes(), field.as_bytes()])?;
        reply
            .into_string()?
            .ok_or_else(|| ClientError::field_not_found(key, field))
    }

    fn has(&self, owner: &str, field: &str) -> ClientResult<bool> {
        let key = self.handle.element_key(owner);
        let found = self
            .handle
            .execute(&[b"HEXISTS", key.as_bytes(), field.as_bytes()])?
            .into_integer()?;
        Ok(found == 1)
    }

    fn exists(&self, owner: &str) -> ClientResult<bool> {
        let key = self.handle.element_key(owner);
        let count = self
            .handle
            .execute(&[b"EXISTS", key.as_bytes()])?
            .into_integer()?;
        Ok(count > 0)
    }

    fn keys(&self, owner: &str) -> ClientResult<Vec<String>> {
        let key = self.handle.element_key(owner);
        self.handle
            .execute(&[b"HKEYS", key.as_bytes()])?
            .into_strings()
    }

    fn get_all(&self) -> ClientResult<Vec<String>> {
        self.handle.scan_elements()
    }

    fn time_to_live(&self, owner: &str) -> ClientResult<Ttl> {
        self.handle.time_to_live(&self.handle.element_key(owner))
    }

    fn del(&self, owner: &str, field: &str) -> ClientResult<()> {
        let key = self.handle.element_key(owner);
        self.handle
            .execute(&[b"HDEL", key.as_bytes(), field.as_bytes()])?
            .into_integer()?;
        Ok(())
    }

    fn remove(&self, owner: &str) -> ClientResult<()> {
        self.handle.delete(&self.handle.element_key(owner))
    }

    fn clear(&self) -> ClientResult<()> {
        self.handle.delete_elements()?;
        Ok(())
    }

    fn select_database(&mut self, index: u32) {
        self.handle.set_database(index);
    }
}
