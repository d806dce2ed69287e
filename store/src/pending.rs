//! The pending tables.
//!
//! A pending entry exists exactly while a send has not been received. Keys
//! are the 64-byte concatenation (destination ‖ source_hash); the epoch of
//! the *source* block picks the v0/v1 partition.

use almond_types::{Account, Amount, BlockHash, Epoch};
use serde::{Deserialize, Serialize};

use crate::{ReadTxn, StoreError, Table, WriteTxn};

/// Key of a pending entry: who may receive it, and which send created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PendingKey {
    pub destination: Account,
    pub hash: BlockHash,
}

impl PendingKey {
    pub fn new(destination: Account, hash: BlockHash) -> Self {
        Self { destination, hash }
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(self.destination.as_bytes());
        bytes[32..].copy_from_slice(self.hash.as_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 64 {
            return None;
        }
        let destination: [u8; 32] = bytes[..32].try_into().ok()?;
        let hash: [u8; 32] = bytes[32..].try_into().ok()?;
        Some(Self {
            destination: Account::new(destination),
            hash: BlockHash::new(hash),
        })
    }
}

/// Information on an uncollected send.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInfo {
    pub source: Account,
    pub amount: Amount,
    pub epoch: Epoch,
}

impl PendingInfo {
    pub fn new(source: Account, amount: Amount, epoch: Epoch) -> Self {
        Self {
            source,
            amount,
            epoch,
        }
    }
}

/// Typed view over the epoch-partitioned pending tables.
pub struct PendingTable;

impl PendingTable {
    fn table_for(epoch: Epoch) -> Table {
        match epoch {
            Epoch::Epoch1 => Table::PendingV1,
            _ => Table::PendingV0,
        }
    }

    pub fn put(
        txn: &mut dyn WriteTxn,
        key: &PendingKey,
        info: &PendingInfo,
    ) -> Result<(), StoreError> {
        let bytes = bincode::serialize(info)?;
        txn.put(Self::table_for(info.epoch), &key.to_bytes(), &bytes)
    }

    pub fn get(txn: &dyn ReadTxn, key: &PendingKey) -> Result<Option<PendingInfo>, StoreError> {
        for table in [Table::PendingV1, Table::PendingV0] {
            if let Some(bytes) = txn.get(table, &key.to_bytes())? {
                return Ok(Some(bincode::deserialize(&bytes)?));
            }
        }
        Ok(None)
    }

    pub fn exists(txn: &dyn ReadTxn, key: &PendingKey) -> Result<bool, StoreError> {
        Ok(Self::get(txn, key)?.is_some())
    }

    pub fn del(txn: &mut dyn WriteTxn, key: &PendingKey) -> Result<(), StoreError> {
        txn.delete(Table::PendingV0, &key.to_bytes())?;
        txn.delete(Table::PendingV1, &key.to_bytes())?;
        Ok(())
    }

    /// All pending entries destined for one account.
    pub fn account_pending(
        txn: &dyn ReadTxn,
        destination: &Account,
    ) -> Result<Vec<(PendingKey, PendingInfo)>, StoreError> {
        let mut result = Vec::new();
        for table in [Table::PendingV0, Table::PendingV1] {
            for (key, value) in txn.prefix(table, destination.as_bytes())? {
                let pending_key = PendingKey::from_bytes(&key)
                    .ok_or_else(|| StoreError::Backend("malformed pending key".into()))?;
                result.push((pending_key, bincode::deserialize(&value)?));
            }
        }
        Ok(result)
    }

    /// Every pending entry. Used by supply-invariant checks.
    pub fn iter(txn: &dyn ReadTxn) -> Result<Vec<(PendingKey, PendingInfo)>, StoreError> {
        let mut result = Vec::new();
        for table in [Table::PendingV0, Table::PendingV1] {
            for (key, value) in txn.iter(table)? {
                let pending_key = PendingKey::from_bytes(&key)
                    .ok_or_else(|| StoreError::Backend("malformed pending key".into()))?;
                result.push((pending_key, bincode::deserialize(&value)?));
            }
        }
        Ok(result)
    }

    pub fn count(txn: &dyn ReadTxn) -> Result<u64, StoreError> {
        Ok(txn.count(Table::PendingV0)? + txn.count(Table::PendingV1)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemStore, Store};

    #[test]
    fn key_bytes_round_trip() {
        let key = PendingKey::new(Account::new([1u8; 32]), BlockHash::new([2u8; 32]));
        assert_eq!(PendingKey::from_bytes(&key.to_bytes()), Some(key));
        assert_eq!(PendingKey::from_bytes(&[0u8; 10]), None);
    }

    #[test]
    fn put_get_del() {
        let store = MemStore::new();
        let key = PendingKey::new(Account::new([1u8; 32]), BlockHash::new([2u8; 32]));
        let info = PendingInfo::new(Account::new([3u8; 32]), Amount::raw(77), Epoch::Epoch0);

        let mut txn = store.tx_begin_write().unwrap();
        PendingTable::put(txn.as_mut(), &key, &info).unwrap();
        assert_eq!(PendingTable::get(txn.as_read(), &key).unwrap(), Some(info));

        PendingTable::del(txn.as_mut(), &key).unwrap();
        assert!(!PendingTable::exists(txn.as_read(), &key).unwrap());
    }

    #[test]
    fn account_pending_scans_by_destination() {
        let store = MemStore::new();
        let destination = Account::new([1u8; 32]);
        let other = Account::new([2u8; 32]);
        let mut txn = store.tx_begin_write().unwrap();
        for (index, dest) in [destination, destination, other].iter().enumerate() {
            let key = PendingKey::new(*dest, BlockHash::new([index as u8 + 10; 32]));
            let info = PendingInfo::new(Account::new([9u8; 32]), Amount::raw(1), Epoch::Epoch0);
            PendingTable::put(txn.as_mut(), &key, &info).unwrap();
        }

        let entries = PendingTable::account_pending(txn.as_read(), &destination).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(PendingTable::count(txn.as_read()).unwrap(), 3);
    }

    #[test]
    fn epoch1_entries_found_and_deleted() {
        let store = MemStore::new();
        let key = PendingKey::new(Account::new([1u8; 32]), BlockHash::new([2u8; 32]));
        let info = PendingInfo::new(Account::new([3u8; 32]), Amount::raw(5), Epoch::Epoch1);
        let mut txn = store.tx_begin_write().unwrap();
        PendingTable::put(txn.as_mut(), &key, &info).unwrap();
        assert!(PendingTable::exists(txn.as_read(), &key).unwrap());
        PendingTable::del(txn.as_mut(), &key).unwrap();
        assert!(!PendingTable::exists(txn.as_read(), &key).unwrap());
    }
}
