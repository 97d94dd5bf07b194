//! # Capability Traits
//!
//! The abstractions callers program against. Every concrete collection
//! implements exactly one of these, so code can accept `impl ListStore` (or
//! a generic bound) instead of a concrete type.
//!
//! Operations run against the collection's own database index, which
//! [`select_database`](KeyValueStore::select_database) changes for that
//! collection only.

use std::time::Duration;

use skv_client::ClientResult;

use crate::ttl::Ttl;

/// Independent string keys with optional expiration.
pub trait KeyValueStore {
    /// Stores `value` under `key`, overwriting silently.
    fn set(&self, key: &str, value: &str) -> ClientResult<()>;

    /// Returns the value under `key`, or a `NotFound` error if absent or
    /// expired.
    fn get(&self, key: &str) -> ClientResult<String>;

    /// Stores `value` under `key` and expires it after `ttl`.
    fn set_expire(&self, key: &str, value: &str, ttl: Duration) -> ClientResult<()>;

    /// Remaining lifetime of `key`; `NotFound` if absent.
    fn time_to_live(&self, key: &str) -> ClientResult<Ttl>;

    /// Atomically adds one to the integer under `key` and returns the new
    /// value. A missing key counts as zero.
    fn inc(&self, key: &str) -> ClientResult<String>;

    /// Removes `key`. Absent keys are not an error.
    fn del(&self, key: &str) -> ClientResult<()>;

    /// Removes every key of this collection, that is every store key
    /// starting with `name:`. A hash map with the same name keeps its owners
    /// under that prefix too, as does any list or set named `name:...`, and
    /// those are removed along with it.
    fn remove(&self) -> ClientResult<()>;

    fn clear(&self) -> ClientResult<()> {
        self.remove()
    }

    fn select_database(&mut self, index: u32);
}

/// Ordered sequence of strings, appended at the end.
pub trait ListStore {
    fn add(&self, value: &str) -> ClientResult<()>;

    /// All items in insertion order; empty when the list does not exist.
    fn get_all(&self) -> ClientResult<Vec<String>>;

    /// The most recently added item; `NotFound` when the list is empty.
    fn get_last(&self) -> ClientResult<String>;

    /// The `n` most recently added items, oldest first.
    fn get_last_n(&self, n: usize) -> ClientResult<Vec<String>>;

    fn len(&self) -> ClientResult<usize>;

    fn is_empty(&self) -> ClientResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Deletes the whole list.
    fn remove(&self) -> ClientResult<()>;

    fn clear(&self) -> ClientResult<()> {
        self.remove()
    }

    fn select_database(&mut self, index: u32);
}

/// Unordered unique strings.
pub trait SetStore {
    /// Adds `member`; adding an existing member succeeds without change.
    fn add(&self, member: &str) -> ClientResult<()>;

    fn has(&self, member: &str) -> ClientResult<bool>;

    /// All members, in no particular order.
    fn get_all(&self) -> ClientResult<Vec<String>>;

    fn len(&self) -> ClientResult<usize>;

    /// Removes `member`. Absent members are not an error.
    fn del(&self, member: &str) -> ClientResult<()>;

    /// Deletes the whole set.
    fn remove(&self) -> ClientResult<()>;

    fn clear(&self) -> ClientResult<()> {
        self.remove()
    }

    fn select_database(&mut self, index: u32);
}

/// Objects with named fields, grouped by owner id.
pub trait HashMapStore {
    fn set(&self, owner: &str, field: &str, value: &str) -> ClientResult<()>;

    /// Sets a field and expires the owner's whole object after `ttl`.
    fn set_expire(&self, owner: &str, field: &str, value: &str, ttl: Duration)
        -> ClientResult<()>;

    /// `NotFound` when the owner or the field is absent.
    fn get(&self, owner: &str, field: &str) -> ClientResult<String>;

    fn has(&self, owner: &str, field: &str) -> ClientResult<bool>;

    /// Whether `owner` has any fields.
    fn exists(&self, owner: &str) -> ClientResult<bool>;

    /// Field names stored for `owner`.
    fn keys(&self, owner: &str) -> ClientResult<Vec<String>>;

    /// Every owner id in this hash map.
    fn get_all(&self) -> ClientResult<Vec<String>>;

    fn time_to_live(&self, owner: &str) -> ClientResult<Ttl>;

    /// Removes one field. Absent fields are not an error.
    fn del(&self, owner: &str, field: &str) -> ClientResult<()>;

    /// Removes an owner with all of its fields.
    fn remove(&self, owner: &str) -> ClientResult<()>;

    /// Removes every owner.
    fn clear(&self) -> ClientResult<()>;

    fn select_database(&mut self, index: u32);
}

/// Factory for collections bound to one pool and database.
pub trait CollectionFactory {
    type KeyValue: KeyValueStore;
    type List: ListStore;
    type Set: SetStore;
    type HashMap: HashMapStore;

    fn create_key_value(&self, name: &str) -> Self::KeyValue;
    fn create_list(&self, name: &str) -> Self::List;
    fn create_set(&self, name: &str) -> Self::Set;
    fn create_hash_map(&self, name: &str) -> Self::HashMap;
}
