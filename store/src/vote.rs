//! The votes table: voting account → its latest vote.
//!
//! Values are opaque bytes; the consensus crate owns the vote encoding. The
//! store only guarantees one row per account.

use almond_types::Account;

use crate::{ReadTxn, StoreError, Table, WriteTxn};

/// Typed view over the votes table.
pub struct VoteTable;

impl VoteTable {
    pub fn put(txn: &mut dyn WriteTxn, account: &Account, vote: &[u8]) -> Result<(), StoreError> {
        txn.put(Table::Votes, account.as_bytes(), vote)
    }

    pub fn get(txn: &dyn ReadTxn, account: &Account) -> Result<Option<Vec<u8>>, StoreError> {
        txn.get(Table::Votes, account.as_bytes())
    }

    pub fn del(txn: &mut dyn WriteTxn, account: &Account) -> Result<(), StoreError> {
        txn.delete(Table::Votes, account.as_bytes())
    }

    pub fn count(txn: &dyn ReadTxn) -> Result<u64, StoreError> {
        txn.count(Table::Votes)
    }
}
