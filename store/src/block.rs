//! The block tables, partitioned by variant.
//!
//! Each block is stored with its sideband under the table matching its
//! shape; state blocks are further split by epoch. Lookups by bare hash
//! probe the partitions in order of how common each shape is.

use almond_blocks::{Block, BlockSideband, BlockType};
use almond_types::{BlockHash, Epoch};
use serde::{Deserialize, Serialize};

use crate::{ReadTxn, StoreError, Table, WriteTxn};

/// A block together with its sideband.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlock {
    pub block: Block,
    pub sideband: BlockSideband,
}

const BLOCK_TABLES: [Table; 6] = [
    Table::StateBlocksV0,
    Table::StateBlocksV1,
    Table::SendBlocks,
    Table::ReceiveBlocks,
    Table::OpenBlocks,
    Table::ChangeBlocks,
];

/// Typed view over the variant-partitioned block tables.
pub struct BlockTable;

impl BlockTable {
    fn table_for(block: &Block, epoch: Epoch) -> Table {
        match block.block_type() {
            BlockType::Send => Table::SendBlocks,
            BlockType::Receive => Table::ReceiveBlocks,
            BlockType::Open => Table::OpenBlocks,
            BlockType::Change => Table::ChangeBlocks,
            BlockType::State | BlockType::Invalid | BlockType::NotABlock => match epoch {
                Epoch::Epoch1 => Table::StateBlocksV1,
                _ => Table::StateBlocksV0,
            },
        }
    }

    pub fn put(
        txn: &mut dyn WriteTxn,
        block: &Block,
        sideband: &BlockSideband,
    ) -> Result<(), StoreError> {
        let entry = StoredBlock {
            block: block.clone(),
            sideband: sideband.clone(),
        };
        let bytes = bincode::serialize(&entry)?;
        let table = Self::table_for(block, sideband.epoch);
        txn.put(table, block.hash().as_bytes(), &bytes)
    }

    pub fn get(txn: &dyn ReadTxn, hash: &BlockHash) -> Result<Option<StoredBlock>, StoreError> {
        for table in BLOCK_TABLES {
            if let Some(bytes) = txn.get(table, hash.as_bytes())? {
                return Ok(Some(bincode::deserialize(&bytes)?));
            }
        }
        Ok(None)
    }

    pub fn exists(txn: &dyn ReadTxn, hash: &BlockHash) -> Result<bool, StoreError> {
        for table in BLOCK_TABLES {
            if txn.exists(table, hash.as_bytes())? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn del(txn: &mut dyn WriteTxn, hash: &BlockHash) -> Result<(), StoreError> {
        for table in BLOCK_TABLES {
            txn.delete(table, hash.as_bytes())?;
        }
        Ok(())
    }

    /// Record `successor` in the sideband of `hash`. Zero clears it (the
    /// block became the head again after a rollback).
    pub fn set_successor(
        txn: &mut dyn WriteTxn,
        hash: &BlockHash,
        successor: BlockHash,
    ) -> Result<(), StoreError> {
        let Some(mut entry) = Self::get(txn.as_read(), hash)? else {
            return Err(StoreError::NotFound(format!("block {}", hash)));
        };
        entry.sideband.successor = successor;
        let bytes = bincode::serialize(&entry)?;
        let table = Self::table_for(&entry.block, entry.sideband.epoch);
        txn.put(table, hash.as_bytes(), &bytes)
    }

    /// The block following `hash` on its chain, if any.
    pub fn successor(txn: &dyn ReadTxn, hash: &BlockHash) -> Result<Option<BlockHash>, StoreError> {
        Ok(Self::get(txn, hash)?
            .map(|entry| entry.sideband.successor)
            .filter(|successor| !successor.is_zero()))
    }

    pub fn count(txn: &dyn ReadTxn) -> Result<u64, StoreError> {
        let mut total = 0;
        for table in BLOCK_TABLES {
            total += txn.count(table)?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemStore, Store};
    use almond_crypto::KeyPair;
    use almond_types::{Account, Amount};

    fn make_entry() -> (Block, BlockSideband) {
        let kp = KeyPair::generate();
        let block = Block::Send(almond_blocks::SendBlock::new(
            BlockHash::new([1u8; 32]),
            Account::new([2u8; 32]),
            Amount::raw(50),
            &kp.secret,
            0,
        ));
        let sideband = BlockSideband::new(
            BlockHash::ZERO,
            kp.public,
            2,
            Amount::raw(50),
            1000,
            Epoch::Epoch0,
        );
        (block, sideband)
    }

    #[test]
    fn put_get_round_trip() {
        let store = MemStore::new();
        let (block, sideband) = make_entry();
        let mut txn = store.tx_begin_write().unwrap();
        BlockTable::put(txn.as_mut(), &block, &sideband).unwrap();

        let stored = BlockTable::get(txn.as_read(), &block.hash()).unwrap().unwrap();
        assert_eq!(stored.block, block);
        assert_eq!(stored.sideband, sideband);
        assert!(BlockTable::exists(txn.as_read(), &block.hash()).unwrap());
        assert_eq!(BlockTable::count(txn.as_read()).unwrap(), 1);
    }

    #[test]
    fn successor_round_trip() {
        let store = MemStore::new();
        let (block, sideband) = make_entry();
        let mut txn = store.tx_begin_write().unwrap();
        BlockTable::put(txn.as_mut(), &block, &sideband).unwrap();

        assert_eq!(BlockTable::successor(txn.as_read(), &block.hash()).unwrap(), None);
        let next = BlockHash::new([7u8; 32]);
        BlockTable::set_successor(txn.as_mut(), &block.hash(), next).unwrap();
        assert_eq!(
            BlockTable::successor(txn.as_read(), &block.hash()).unwrap(),
            Some(next)
        );
    }

    #[test]
    fn delete_removes_block() {
        let store = MemStore::new();
        let (block, sideband) = make_entry();
        let mut txn = store.tx_begin_write().unwrap();
        BlockTable::put(txn.as_mut(), &block, &sideband).unwrap();
        BlockTable::del(txn.as_mut(), &block.hash()).unwrap();
        assert!(!BlockTable::exists(txn.as_read(), &block.hash()).unwrap());
    }
}
