//! The unchecked table.
//!
//! Blocks whose dependency (previous block or source send) has not arrived
//! yet wait here, keyed by the missing hash. The table is multi-valued: the
//! stored key is (dependency ‖ block_hash), so several blocks can wait on
//! the same dependency.

use almond_blocks::Block;
use almond_types::BlockHash;
use serde::{Deserialize, Serialize};

use crate::{ReadTxn, StoreError, Table, WriteTxn};

/// Outcome of signature verification carried alongside a queued block so the
/// processor doesn't verify twice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignatureVerification {
    Unknown = 0,
    Invalid = 1,
    Valid = 2,
    /// Valid as an epoch block (signed by the epoch signer).
    ValidEpoch = 3,
}

/// A block waiting for a missing dependency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncheckedInfo {
    pub block: Block,
    /// Seconds since the epoch when the block arrived.
    pub modified: u64,
    pub verified: SignatureVerification,
}

impl UncheckedInfo {
    pub fn new(block: Block, modified: u64) -> Self {
        Self {
            block,
            modified,
            verified: SignatureVerification::Unknown,
        }
    }
}

fn compose_key(dependency: &BlockHash, block_hash: &BlockHash) -> [u8; 64] {
    let mut key = [0u8; 64];
    key[..32].copy_from_slice(dependency.as_bytes());
    key[32..].copy_from_slice(block_hash.as_bytes());
    key
}

/// Typed view over the unchecked table.
pub struct UncheckedTable;

impl UncheckedTable {
    pub fn put(
        txn: &mut dyn WriteTxn,
        dependency: &BlockHash,
        info: &UncheckedInfo,
    ) -> Result<(), StoreError> {
        let key = compose_key(dependency, &info.block.hash());
        let bytes = bincode::serialize(info)?;
        txn.put(Table::Unchecked, &key, &bytes)
    }

    /// Drain every block waiting on `dependency`.
    pub fn pop_dependents(
        txn: &mut dyn WriteTxn,
        dependency: &BlockHash,
    ) -> Result<Vec<UncheckedInfo>, StoreError> {
        let entries = txn.as_read().prefix(Table::Unchecked, dependency.as_bytes())?;
        let mut result = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            txn.delete(Table::Unchecked, &key)?;
            result.push(bincode::deserialize(&value)?);
        }
        Ok(result)
    }

    /// Look without draining.
    pub fn dependents(
        txn: &dyn ReadTxn,
        dependency: &BlockHash,
    ) -> Result<Vec<UncheckedInfo>, StoreError> {
        txn.prefix(Table::Unchecked, dependency.as_bytes())?
            .into_iter()
            .map(|(_, value)| bincode::deserialize(&value).map_err(StoreError::from))
            .collect()
    }

    pub fn del(
        txn: &mut dyn WriteTxn,
        dependency: &BlockHash,
        block_hash: &BlockHash,
    ) -> Result<(), StoreError> {
        txn.delete(Table::Unchecked, &compose_key(dependency, block_hash))
    }

    pub fn count(txn: &dyn ReadTxn) -> Result<u64, StoreError> {
        txn.count(Table::Unchecked)
    }

    /// Delete entries older than `cutoff` (seconds since the epoch).
    /// Returns how many were removed.
    pub fn purge_older_than(txn: &mut dyn WriteTxn, cutoff: u64) -> Result<u64, StoreError> {
        let entries = txn.as_read().iter(Table::Unchecked)?;
        let mut removed = 0;
        for (key, value) in entries {
            let info: UncheckedInfo = bincode::deserialize(&value)?;
            if info.modified < cutoff {
                txn.delete(Table::Unchecked, &key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Drop the whole table.
    pub fn clear(txn: &mut dyn WriteTxn) -> Result<(), StoreError> {
        let keys: Vec<Vec<u8>> = txn
            .as_read()
            .iter(Table::Unchecked)?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            txn.delete(Table::Unchecked, &key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemStore, Store};
    use almond_blocks::SendBlock;
    use almond_crypto::KeyPair;
    use almond_types::{Account, Amount};

    fn make_block(previous: u8, balance: u128) -> Block {
        let kp = KeyPair::generate();
        Block::Send(SendBlock::new(
            BlockHash::new([previous; 32]),
            Account::new([2u8; 32]),
            Amount::raw(balance),
            &kp.secret,
            0,
        ))
    }

    #[test]
    fn multiple_dependents_per_dependency() {
        let store = MemStore::new();
        let dependency = BlockHash::new([0xAB; 32]);
        let mut txn = store.tx_begin_write().unwrap();
        UncheckedTable::put(
            txn.as_mut(),
            &dependency,
            &UncheckedInfo::new(make_block(0xAB, 1), 100),
        )
        .unwrap();
        UncheckedTable::put(
            txn.as_mut(),
            &dependency,
            &UncheckedInfo::new(make_block(0xAB, 2), 101),
        )
        .unwrap();
        assert_eq!(UncheckedTable::count(txn.as_read()).unwrap(), 2);

        let drained = UncheckedTable::pop_dependents(txn.as_mut(), &dependency).unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(UncheckedTable::count(txn.as_read()).unwrap(), 0);
    }

    #[test]
    fn unrelated_dependencies_untouched() {
        let store = MemStore::new();
        let dep1 = BlockHash::new([1u8; 32]);
        let dep2 = BlockHash::new([2u8; 32]);
        let mut txn = store.tx_begin_write().unwrap();
        UncheckedTable::put(txn.as_mut(), &dep1, &UncheckedInfo::new(make_block(1, 1), 100))
            .unwrap();
        UncheckedTable::put(txn.as_mut(), &dep2, &UncheckedInfo::new(make_block(2, 2), 100))
            .unwrap();

        let drained = UncheckedTable::pop_dependents(txn.as_mut(), &dep1).unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(UncheckedTable::count(txn.as_read()).unwrap(), 1);
    }

    #[test]
    fn purge_respects_cutoff() {
        let store = MemStore::new();
        let dep = BlockHash::new([1u8; 32]);
        let mut txn = store.tx_begin_write().unwrap();
        UncheckedTable::put(txn.as_mut(), &dep, &UncheckedInfo::new(make_block(1, 1), 100))
            .unwrap();
        UncheckedTable::put(txn.as_mut(), &dep, &UncheckedInfo::new(make_block(1, 2), 500))
            .unwrap();

        let removed = UncheckedTable::purge_older_than(txn.as_mut(), 200).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(UncheckedTable::count(txn.as_read()).unwrap(), 1);
    }

    #[test]
    fn clear_empties_table() {
        let store = MemStore::new();
        let dep = BlockHash::new([1u8; 32]);
        let mut txn = store.tx_begin_write().unwrap();
        UncheckedTable::put(txn.as_mut(), &dep, &UncheckedInfo::new(make_block(1, 1), 100))
            .unwrap();
        UncheckedTable::clear(txn.as_mut()).unwrap();
        assert_eq!(UncheckedTable::count(txn.as_read()).unwrap(), 0);
    }
}
