//! The meta table: schema version and the node's identity key.

use almond_types::RawKey;

use crate::{ReadTxn, StoreError, Table, WriteTxn};

const VERSION_KEY: &[u8] = b"version";
const NODE_ID_KEY: &[u8] = b"node_id";

/// Typed view over the meta table.
pub struct MetaTable;

impl MetaTable {
    /// The stored schema version; 0 for a fresh database.
    pub fn schema_version(txn: &dyn ReadTxn) -> Result<u32, StoreError> {
        match txn.get(Table::Meta, VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes
                    .try_into()
                    .map_err(|_| StoreError::Backend("malformed schema version".into()))?;
                Ok(u32::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    pub fn set_schema_version(txn: &mut dyn WriteTxn, version: u32) -> Result<(), StoreError> {
        txn.put(Table::Meta, VERSION_KEY, &version.to_le_bytes())
    }

    pub fn node_id(txn: &dyn ReadTxn) -> Result<Option<RawKey>, StoreError> {
        match txn.get(Table::Meta, NODE_ID_KEY)? {
            Some(bytes) => {
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| StoreError::Backend("malformed node id".into()))?;
                Ok(Some(RawKey::new(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn set_node_id(txn: &mut dyn WriteTxn, key: &RawKey) -> Result<(), StoreError> {
        txn.put(Table::Meta, NODE_ID_KEY, key.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemStore, Store};

    #[test]
    fn fresh_database_is_version_zero() {
        let store = MemStore::new();
        let txn = store.tx_begin_read().unwrap();
        assert_eq!(MetaTable::schema_version(txn.as_ref()).unwrap(), 0);
    }

    #[test]
    fn version_round_trip() {
        let store = MemStore::new();
        let mut txn = store.tx_begin_write().unwrap();
        MetaTable::set_schema_version(txn.as_mut(), 7).unwrap();
        assert_eq!(MetaTable::schema_version(txn.as_read()).unwrap(), 7);
    }

    #[test]
    fn node_id_round_trip() {
        let store = MemStore::new();
        let mut txn = store.tx_begin_write().unwrap();
        assert!(MetaTable::node_id(txn.as_read()).unwrap().is_none());
        let key = RawKey::new([9u8; 32]);
        MetaTable::set_node_id(txn.as_mut(), &key).unwrap();
        assert!(MetaTable::node_id(txn.as_read()).unwrap() == Some(key));
    }
}
