//! Shared plumbing for every collection: the pool, the store key or key
//! prefix, and the database index each command is sent to.

use std::collections::BTreeSet;
use std::time::Duration;

use skv_client::{ClientError, ClientResult, ConnectionPool, RespValue};
use tracing::debug;

use crate::ttl::Ttl;

/// Keys requested per `SCAN` round trip.
const SCAN_COUNT: &[u8] = b"256";

/// Keys deleted per `DEL` round trip.
const DEL_CHUNK: usize = 256;

/// Separator between a collection name and an element inside it.
pub(crate) const SEPARATOR: char = ':';

#[derive(Debug, Clone)]
pub(crate) struct Handle {
    pool: ConnectionPool,
    name: String,
    database: u32,
}

impl Handle {
    pub(crate) fn new(pool: &ConnectionPool, name: String) -> Self {
        Handle {
            database: pool.default_database(),
            pool: pool.clone(),
            name,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn database(&self) -> u32 {
        self.database
    }

    pub(crate) fn set_database(&mut self, index: u32) {
        self.database = index;
    }

    /// Store key of `element` inside this collection: `name:element`.
    pub(crate) fn element_key(&self, element: &str) -> String {
        format!("{}{SEPARATOR}{element}", self.name)
    }

    pub(crate) fn execute(&self, args: &[&[u8]]) -> ClientResult<RespValue> {
        self.pool.execute(self.database, args)
    }

    /// `DEL` of a single key. Deleting an absent key succeeds.
    pub(crate) fn delete(&self, key: &str) -> ClientResult<()> {
        self.execute(&[b"DEL", key.as_bytes()])?.into_integer()?;
        Ok(())
    }

    /// Remaining lifetime of `key`, rounded to whole seconds the way `TTL`
    /// rounds.
    pub(crate) fn time_to_live(&self, key: &str) -> ClientResult<Ttl> {
        let millis = self.execute(&[b"PTTL", key.as_bytes()])?.into_integer()?;
        Ttl::from_pttl(millis).ok_or_else(|| ClientError::not_found(key))
    }

    /// Every element name stored under `name:`, sorted, prefix stripped.
    pub(crate) fn scan_elements(&self) -> ClientResult<Vec<String>> {
        let prefix = self.element_key("");
        let keys = self.scan_prefix(&prefix)?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    /// Deletes every key under `name:`. Returns the number of keys removed.
    pub(crate) fn delete_elements(&self) -> ClientResult<u64> {
        let keys = self.scan_prefix(&self.element_key(""))?;
        let mut removed = 0;
        for chunk in keys.chunks(DEL_CHUNK) {
            let mut args: Vec<&[u8]> = Vec::with_capacity(chunk.len() + 1);
            args.push(b"DEL");
            args.extend(chunk.iter().map(|key| key.as_bytes()));
            removed += self.execute(&args)?.into_integer()?.max(0) as u64;
        }
        debug!(name = %self.name, database = self.database, removed, "collection cleared");
        Ok(removed)
    }

    fn scan_prefix(&self, prefix: &str) -> ClientResult<Vec<String>> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut keys = BTreeSet::new();
        let mut cursor = 0u64;
        loop {
            let position = cursor.to_string();
            let reply = self.execute(&[
                b"SCAN",
                position.as_bytes(),
                b"MATCH",
                pattern.as_bytes(),
                b"COUNT",
                SCAN_COUNT,
            ])?;
            let (next, page) = reply.into_scan_page()?;
            // SCAN may return a key more than once.
            keys.extend(page);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys.into_iter().collect())
    }
}

/// Escapes glob metacharacters so `s` only matches itself in `MATCH`.
pub(crate) fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Milliseconds for `PX`/`PEXPIRE`; the store rejects zero.
pub(crate) fn expire_millis(ttl: Duration) -> String {
    ttl.as_millis().max(1).to_string()
}
