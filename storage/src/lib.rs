//! Key/value cache for the EZchain simulator
//!
//! Serialised transactions, batches and personal-chain blocks are written
//! through to a [`KvStore`]. The store is a cache, not a source of truth:
//! the simulator behaves identically with the in-memory backend or the
//! redb-backed one, so persistence is purely an operational concern.

mod error;

pub use error::{StorageError, StorageResult};

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;
use redb::{Database, ReadableTable, TableDefinition};

/// Single table holding every cached entity, keyed by a namespaced string
/// (`tx/<id>`, `inf/<digest>`, `pb/<node> <index>`).
const KV_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("ezchain_kv");

/// String-keyed persistent map: the only contract the simulator core needs.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn put(&self, key: &str, value: &str) -> StorageResult<()>;
    fn delete(&self, key: &str) -> StorageResult<()>;
}

/// In-memory backend, the default for simulation runs.
#[derive(Default)]
pub struct MemoryStore {
    map: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        self.map.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.map.write().remove(key);
        Ok(())
    }
}

/// On-disk backend over a single redb table.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open (or create) the database at `path` and ensure the table exists.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(KV_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(KV_TABLE)?;
        match table.get(key)? {
            Some(guard) => Ok(Some(String::from_utf8(guard.value().to_vec())?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV_TABLE)?;
            table.insert(key, value.as_bytes())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(KV_TABLE)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn KvStore) {
        assert_eq!(store.get("tx/1").unwrap(), None);

        store.put("tx/1", "1,7,0,0,1;").unwrap();
        assert_eq!(store.get("tx/1").unwrap().as_deref(), Some("1,7,0,0,1;"));

        store.put("tx/1", "updated").unwrap();
        assert_eq!(store.get("tx/1").unwrap().as_deref(), Some("updated"));

        store.delete("tx/1").unwrap();
        assert_eq!(store.get("tx/1").unwrap(), None);

        // Deleting an absent key is not an error.
        store.delete("tx/1").unwrap();
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        exercise(&store);
        assert!(store.is_empty());
    }

    #[test]
    fn test_redb_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("kv.redb")).unwrap();
        exercise(&store);
    }

    #[test]
    fn test_redb_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.put("inf/aa", "payload").unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get("inf/aa").unwrap().as_deref(), Some("payload"));
    }
}
