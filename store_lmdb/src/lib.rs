//! LMDB storage backend.
//!
//! One environment, one named database per logical table. Write transactions
//! are exclusive by LMDB's own rules; readers get MVCC snapshots, which is
//! exactly the isolation contract `almond-store` promises.

pub mod migration;

pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};

use std::collections::HashMap;
use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};

use almond_store::{ReadTxn, Store, StoreError, Table, WriteTxn};

/// Default LMDB map size: 128 GiB of address space, grown lazily by the OS.
pub const DEFAULT_MAP_SIZE: usize = 128 * 1024 * 1024 * 1024;

fn lmdb_err(err: heed::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// The LMDB-backed store.
pub struct LmdbStore {
    env: Env,
    dbs: HashMap<Table, Database<Bytes, Bytes>>,
}

impl LmdbStore {
    /// Open or create an environment at `path` and every logical table in it.
    pub fn open(path: &Path, map_size: usize, max_dbs: u32) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path)
            .map_err(|e| StoreError::Backend(format!("create data dir: {e}")))?;

        // Safety: the environment path is only opened once per process; the
        // daemon guards this with its startup sequence.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(max_dbs)
                .open(path)
                .map_err(lmdb_err)?
        };

        let mut dbs = HashMap::with_capacity(Table::ALL.len());
        let mut wtxn = env.write_txn().map_err(lmdb_err)?;
        for table in Table::ALL {
            let db = env
                .create_database::<Bytes, Bytes>(&mut wtxn, Some(table.name()))
                .map_err(lmdb_err)?;
            dbs.insert(table, db);
        }
        wtxn.commit().map_err(lmdb_err)?;

        tracing::debug!(path = %path.display(), "opened LMDB environment");
        Ok(Self { env, dbs })
    }

    fn db(&self, table: Table) -> Database<Bytes, Bytes> {
        *self.dbs.get(&table).expect("all tables created at open")
    }
}

impl Store for LmdbStore {
    fn tx_begin_read(&self) -> Result<Box<dyn ReadTxn + '_>, StoreError> {
        let txn = self.env.read_txn().map_err(lmdb_err)?;
        Ok(Box::new(LmdbReadTxn { store: self, txn }))
    }

    fn tx_begin_write(&self) -> Result<Box<dyn WriteTxn + '_>, StoreError> {
        let txn = self.env.write_txn().map_err(lmdb_err)?;
        Ok(Box::new(LmdbWriteTxn { store: self, txn }))
    }
}

struct LmdbReadTxn<'env> {
    store: &'env LmdbStore,
    txn: RoTxn<'env>,
}

impl ReadTxn for LmdbReadTxn<'_> {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self.store.db(table).get(&self.txn, key).map_err(lmdb_err)?;
        Ok(value.map(|bytes| bytes.to_vec()))
    }

    fn prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let iter = self
            .store
            .db(table)
            .prefix_iter(&self.txn, prefix)
            .map_err(lmdb_err)?;
        let mut result = Vec::new();
        for entry in iter {
            let (key, value) = entry.map_err(lmdb_err)?;
            result.push((key.to_vec(), value.to_vec()));
        }
        Ok(result)
    }

    fn count(&self, table: Table) -> Result<u64, StoreError> {
        self.store.db(table).len(&self.txn).map_err(lmdb_err)
    }
}

struct LmdbWriteTxn<'env> {
    store: &'env LmdbStore,
    txn: RwTxn<'env>,
}

impl ReadTxn for LmdbWriteTxn<'_> {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self.store.db(table).get(&self.txn, key).map_err(lmdb_err)?;
        Ok(value.map(|bytes| bytes.to_vec()))
    }

    fn prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let iter = self
            .store
            .db(table)
            .prefix_iter(&self.txn, prefix)
            .map_err(lmdb_err)?;
        let mut result = Vec::new();
        for entry in iter {
            let (key, value) = entry.map_err(lmdb_err)?;
            result.push((key.to_vec(), value.to_vec()));
        }
        Ok(result)
    }

    fn count(&self, table: Table) -> Result<u64, StoreError> {
        self.store.db(table).len(&self.txn).map_err(lmdb_err)
    }
}

impl WriteTxn for LmdbWriteTxn<'_> {
    fn put(&mut self, table: Table, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.store
            .db(table)
            .put(&mut self.txn, key, value)
            .map_err(lmdb_err)
    }

    fn delete(&mut self, table: Table, key: &[u8]) -> Result<(), StoreError> {
        self.store
            .db(table)
            .delete(&mut self.txn, key)
            .map(|_| ())
            .map_err(lmdb_err)
    }

    fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.txn.commit().map_err(lmdb_err)
    }

    fn as_read(&self) -> &dyn ReadTxn {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, LmdbStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LmdbStore::open(dir.path(), 64 * 1024 * 1024, 32).unwrap();
        (dir, store)
    }

    #[test]
    fn put_get_commit_round_trip() {
        let (_dir, store) = open_temp();
        let mut txn = store.tx_begin_write().unwrap();
        txn.put(Table::Meta, b"key", b"value").unwrap();
        txn.commit().unwrap();

        let read = store.tx_begin_read().unwrap();
        assert_eq!(read.get(Table::Meta, b"key").unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn uncommitted_writes_abort() {
        let (_dir, store) = open_temp();
        {
            let mut txn = store.tx_begin_write().unwrap();
            txn.put(Table::Meta, b"key", b"value").unwrap();
        }
        let read = store.tx_begin_read().unwrap();
        assert_eq!(read.get(Table::Meta, b"key").unwrap(), None);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LmdbStore::open(dir.path(), 64 * 1024 * 1024, 32).unwrap();
            let mut txn = store.tx_begin_write().unwrap();
            txn.put(Table::Frontier, b"head", b"account").unwrap();
            txn.commit().unwrap();
        }
        let store = LmdbStore::open(dir.path(), 64 * 1024 * 1024, 32).unwrap();
        let read = store.tx_begin_read().unwrap();
        assert_eq!(
            read.get(Table::Frontier, b"head").unwrap(),
            Some(b"account".to_vec())
        );
    }

    #[test]
    fn prefix_iter_is_bounded() {
        let (_dir, store) = open_temp();
        let mut txn = store.tx_begin_write().unwrap();
        txn.put(Table::Unchecked, b"aa1", b"1").unwrap();
        txn.put(Table::Unchecked, b"aa2", b"2").unwrap();
        txn.put(Table::Unchecked, b"ab1", b"3").unwrap();
        txn.commit().unwrap();

        let read = store.tx_begin_read().unwrap();
        assert_eq!(read.prefix(Table::Unchecked, b"aa").unwrap().len(), 2);
        assert_eq!(read.count(Table::Unchecked).unwrap(), 3);
    }
}
