//! In-memory store backend.
//!
//! Used by unit and integration tests in place of LMDB. Write transactions
//! stage a copy of the tables and swap it in on commit, so abort-on-drop and
//! snapshot-isolated readers behave exactly like the disk backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, RwLock};

use crate::{ReadTxn, Store, StoreError, Table, WriteTxn};

type Tables = HashMap<Table, BTreeMap<Vec<u8>, Vec<u8>>>;

fn empty_tables() -> Tables {
    Table::ALL.iter().map(|t| (*t, BTreeMap::new())).collect()
}

fn prefix_scan(tables: &Tables, table: Table, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    let Some(map) = tables.get(&table) else {
        return Vec::new();
    };
    map.range(prefix.to_vec()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// An in-memory store.
pub struct MemStore {
    data: RwLock<Tables>,
    write_lock: Mutex<()>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(empty_tables()),
            write_lock: Mutex::new(()),
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemStore {
    fn tx_begin_read(&self) -> Result<Box<dyn ReadTxn + '_>, StoreError> {
        let snapshot = self.data.read().expect("mem store poisoned").clone();
        Ok(Box::new(MemReadTxn { snapshot }))
    }

    fn tx_begin_write(&self) -> Result<Box<dyn WriteTxn + '_>, StoreError> {
        let guard = self.write_lock.lock().expect("mem store poisoned");
        let staged = self.data.read().expect("mem store poisoned").clone();
        Ok(Box::new(MemWriteTxn {
            store: self,
            _guard: guard,
            staged,
        }))
    }
}

struct MemReadTxn {
    snapshot: Tables,
}

impl ReadTxn for MemReadTxn {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .snapshot
            .get(&table)
            .and_then(|map| map.get(key))
            .cloned())
    }

    fn prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(prefix_scan(&self.snapshot, table, prefix))
    }

    fn count(&self, table: Table) -> Result<u64, StoreError> {
        Ok(self.snapshot.get(&table).map(|m| m.len() as u64).unwrap_or(0))
    }
}

struct MemWriteTxn<'a> {
    store: &'a MemStore,
    _guard: MutexGuard<'a, ()>,
    staged: Tables,
}

impl ReadTxn for MemWriteTxn<'_> {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .staged
            .get(&table)
            .and_then(|map| map.get(key))
            .cloned())
    }

    fn prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(prefix_scan(&self.staged, table, prefix))
    }

    fn count(&self, table: Table) -> Result<u64, StoreError> {
        Ok(self.staged.get(&table).map(|m| m.len() as u64).unwrap_or(0))
    }
}

impl WriteTxn for MemWriteTxn<'_> {
    fn put(&mut self, table: Table, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.staged
            .entry(table)
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, table: Table, key: &[u8]) -> Result<(), StoreError> {
        if let Some(map) = self.staged.get_mut(&table) {
            map.remove(key);
        }
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        *self.store.data.write().expect("mem store poisoned") = self.staged;
        Ok(())
    }

    fn as_read(&self) -> &dyn ReadTxn {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_round_trip() {
        let store = MemStore::new();
        let mut txn = store.tx_begin_write().unwrap();
        txn.put(Table::Meta, b"key", b"value").unwrap();
        assert_eq!(txn.get(Table::Meta, b"key").unwrap(), Some(b"value".to_vec()));
        txn.commit().unwrap();

        let read = store.tx_begin_read().unwrap();
        assert_eq!(read.get(Table::Meta, b"key").unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn uncommitted_writes_are_discarded() {
        let store = MemStore::new();
        {
            let mut txn = store.tx_begin_write().unwrap();
            txn.put(Table::Meta, b"key", b"value").unwrap();
            // dropped without commit
        }
        let read = store.tx_begin_read().unwrap();
        assert_eq!(read.get(Table::Meta, b"key").unwrap(), None);
    }

    #[test]
    fn read_txn_is_a_snapshot() {
        let store = MemStore::new();
        let read = store.tx_begin_read().unwrap();

        let mut txn = store.tx_begin_write().unwrap();
        txn.put(Table::Meta, b"key", b"value").unwrap();
        txn.commit().unwrap();

        // The earlier snapshot must not see the commit.
        assert_eq!(read.get(Table::Meta, b"key").unwrap(), None);
        let fresh = store.tx_begin_read().unwrap();
        assert_eq!(fresh.get(Table::Meta, b"key").unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn prefix_scan_is_bounded() {
        let store = MemStore::new();
        let mut txn = store.tx_begin_write().unwrap();
        txn.put(Table::Unchecked, b"aa1", b"1").unwrap();
        txn.put(Table::Unchecked, b"aa2", b"2").unwrap();
        txn.put(Table::Unchecked, b"ab1", b"3").unwrap();
        txn.commit().unwrap();

        let read = store.tx_begin_read().unwrap();
        let entries = read.prefix(Table::Unchecked, b"aa").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(read.count(Table::Unchecked).unwrap(), 3);
    }

    #[test]
    fn delete_removes_entry() {
        let store = MemStore::new();
        let mut txn = store.tx_begin_write().unwrap();
        txn.put(Table::Meta, b"key", b"value").unwrap();
        txn.delete(Table::Meta, b"key").unwrap();
        txn.commit().unwrap();
        let read = store.tx_begin_read().unwrap();
        assert!(!read.exists(Table::Meta, b"key").unwrap());
    }
}
