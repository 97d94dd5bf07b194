//! # List Collection
//!
//! One store list per collection, appended with `RPUSH` and read back
//! through `LRANGE`.

use skv_client::{ClientError, ClientResult, ConnectionPool};

use crate::capability::ListStore;
use crate::handle::Handle;

/// Ordered list of strings stored under a single store key.
#[derive(Debug, Clone)]
pub struct List {
    handle: Handle,
}

impl List {
    /// Binds the list `name` on the pool's default database.
    pub fn new(pool: &ConnectionPool, name: impl Into<String>) -> Self {
        List {
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

    fn range(&self, start: i64, stop: i64) -> ClientResult<Vec<String>> {
        let (start, stop) = (start.to_string(), stop.to_string());
        self.handle
            .execute(&[
                b"LRANGE",
                self.name().as_bytes(),
                start.as_bytes(),
                stop.as_bytes(),
            ])?
            .into_strings()
    }
}

impl ListStore for List {
    fn add(&self, value: &str) -> ClientResult<()> {
        self.handle
            .execute(&[b"RPUSH", self.name().as_bytes(), value.as_bytes()])?
            .into_integer()?;
        Ok(())
    }

    fn get_all(&self) -> ClientResult<Vec<String>> {
        self.range(0, -1)
    }

    fn get_last(&self) -> ClientResult<String> {
        self.range(-1, -1)?
            .pop()
            .ok_or_else(|| ClientError::not_found(self.name()))
    }

    fn get_last_n(&self, n: usize) -> ClientResult<Vec<String>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let start = i64::try_from(n).map_or(i64::MIN, |n| -n);
        self.range(start, -1)
    }

    fn len(&self) -> ClientResult<usize> {
        let len = self
            .handle
            .execute(&[b"LLEN", self.name().as_bytes()])?
            .into_integer()?;
        Ok(len.max(0) as usize)
    }

    fn remove(&self) -> ClientResult<()> {
        self.handle.delete(self.name())
    }

    fn select_database(&mut self, index: u32) {
        self.handle.set_database(index);
    }
}
