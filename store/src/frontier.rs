//! The frontier table: head block hash → owning account (reverse index).

use almond_types::{Account, BlockHash};

use crate::{ReadTxn, StoreError, Table, WriteTxn};

/// Typed view over the frontier table.
pub struct FrontierTable;

impl FrontierTable {
    pub fn put(
        txn: &mut dyn WriteTxn,
        head: &BlockHash,
        account: &Account,
    ) -> Result<(), StoreError> {
        txn.put(Table::Frontier, head.as_bytes(), account.as_bytes())
    }

    pub fn get(txn: &dyn ReadTxn, head: &BlockHash) -> Result<Option<Account>, StoreError> {
        match txn.get(Table::Frontier, head.as_bytes())? {
            Some(bytes) => {
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| StoreError::Backend("malformed frontier value".into()))?;
                Ok(Some(Account::new(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn del(txn: &mut dyn WriteTxn, head: &BlockHash) -> Result<(), StoreError> {
        txn.delete(Table::Frontier, head.as_bytes())
    }

    pub fn count(txn: &dyn ReadTxn) -> Result<u64, StoreError> {
        txn.count(Table::Frontier)
    }
}
