//! Factory binding new collections to one pool and database.

use skv_client::ConnectionPool;

use crate::capability::CollectionFactory;
use crate::hashmap::HashMap;
use crate::keyvalue::KeyValue;
use crate::list::List;
use crate::set::Set;

/// Builds collections that share one pool and target one database.
#[derive(Debug, Clone)]
pub struct Creator {
    pool: ConnectionPool,
    database: u32,
}

impl Creator {
    pub fn new(pool: &ConnectionPool, database: u32) -> Self {
        Creator {
            pool: pool.clone(),
            database,
        }
    }

    pub fn database(&self) -> u32 {
        self.database
    }
}

impl CollectionFactory for Creator {
    type KeyValue = KeyValue;
    type List = List;
    type Set = Set;
    type HashMap = HashMap;

    fn create_key_value(&self, name: &str) -> KeyValue {
        KeyValue::new(&self.pool, name).with_database(self.database)
    }

    fn create_list(&self, name: &str) -> List {
        List::new(&self.pool, name).with_database(self.database)
    }

    fn create_set(&self, name: &str) -> Set {
        Set::new(&self.pool, name).with_database(self.database)
    }

    fn create_hash_map(&self, name: &str) -> HashMap {
        HashMap::new(&self.pool, name).with_database(self.database)
    }
}
