//! Set collection stored as a single store set named after the collection.

use skv_client::{ClientResult, ConnectionPool};

use crate::capability::SetStore;
use crate::handle::Handle;

/// Set of unique strings stored under a single store key.
#[derive(Debug, Clone)]
pub struct Set {
    handle: Handle,
}

impl Set {
    /// Binds the set `name` on the pool's default database.
    pub fn new(pool: &ConnectionPool, name: impl Into<String>) -> Self {
        Set {
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

impl SetStore for Set {
    fn add(&self, member: &str) -> ClientResult<()> {
        self.handle
            .execute(&[b"SADD", self.name().as_bytes(), member.as_bytes()])?
            .into_integer()?;
        Ok(())
    }

    fn has(&self, member: &str) -> ClientResult<bool> {
        let found = self
            .handle
            .execute(&[b"SISMEMBER", self.name().as_bytes(), member.as_bytes()])?
            .into_integer()?;
        Ok(found == 1)
    }

    fn get_all(&self) -> ClientResult<Vec<String>> {
        self.handle
            .execute(&[b"SMEMBERS", self.name().as_bytes()])?
            .into_strings()
    }

    fn len(&self) -> ClientResult<usize> {
        let len = self
            .handle
            .execute(&[b"SCARD", self.name().as_bytes()])?
            .into_integer()?;
        Ok(len.max(0) as usize)
    }

    fn del(&self, member: &str) -> ClientResult<()> {
        self.handle
            .execute(&[b"SREM", self.name().as_bytes(), member.as_bytes()])?
            .into_integer()?;
        Ok(())
    }

    fn remove(&self) -> ClientResult<()> {
        self.handle.delete(self.name())
    }

    fn select_database(&mut self, index: u32) {
        self.handle.set_database(index);
    }
}
