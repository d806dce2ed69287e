//! The account tables.
//!
//! Accounts are partitioned by epoch: `accounts_v0` holds epoch-0 entries,
//! `accounts_v1` holds accounts upgraded by an epoch block. A lookup probes
//! v1 first, since upgrades only ever move forward.

use almond_types::{Account, Amount, BlockHash, Epoch};
use serde::{Deserialize, Serialize};

use crate::{ReadTxn, StoreError, Table, WriteTxn};

/// Latest information about an account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Most recent block on the chain.
    pub head: BlockHash,
    /// The block that last named the representative.
    pub rep_block: BlockHash,
    /// First block on the chain.
    pub open_block: BlockHash,
    /// Balance at `head`.
    pub balance: Amount,
    /// Seconds since the epoch when the account was last modified.
    pub modified: u64,
    /// Chain length.
    pub block_count: u64,
}

/// Typed view over the epoch-partitioned account tables.
pub struct AccountTable;

impl AccountTable {
    fn table_for(epoch: Epoch) -> Table {
        match epoch {
            Epoch::Epoch1 => Table::AccountsV1,
            _ => Table::AccountsV0,
        }
    }

    pub fn get(
        txn: &dyn ReadTxn,
        account: &Account,
    ) -> Result<Option<(AccountInfo, Epoch)>, StoreError> {
        if let Some(bytes) = txn.get(Table::AccountsV1, account.as_bytes())? {
            return Ok(Some((bincode::deserialize(&bytes)?, Epoch::Epoch1)));
        }
        if let Some(bytes) = txn.get(Table::AccountsV0, account.as_bytes())? {
            return Ok(Some((bincode::deserialize(&bytes)?, Epoch::Epoch0)));
        }
        Ok(None)
    }

    pub fn exists(txn: &dyn ReadTxn, account: &Account) -> Result<bool, StoreError> {
        Ok(Self::get(txn, account)?.is_some())
    }

    /// Write an account's info under its epoch table, clearing any entry in
    /// the other table (an epoch upgrade moves the row).
    pub fn put(
        txn: &mut dyn WriteTxn,
        account: &Account,
        info: &AccountInfo,
        epoch: Epoch,
    ) -> Result<(), StoreError> {
        let bytes = bincode::serialize(info)?;
        let target = Self::table_for(epoch);
        txn.put(target, account.as_bytes(), &bytes)?;
        let other = match target {
            Table::AccountsV1 => Table::AccountsV0,
            _ => Table::AccountsV1,
        };
        txn.delete(other, account.as_bytes())?;
        Ok(())
    }

    pub fn del(txn: &mut dyn WriteTxn, account: &Account) -> Result<(), StoreError> {
        txn.delete(Table::AccountsV0, account.as_bytes())?;
        txn.delete(Table::AccountsV1, account.as_bytes())?;
        Ok(())
    }

    pub fn count(txn: &dyn ReadTxn) -> Result<u64, StoreError> {
        Ok(txn.count(Table::AccountsV0)? + txn.count(Table::AccountsV1)?)
    }

    /// Every account with its info and epoch. Used for weight rebuilds and
    /// integrity checks.
    pub fn iter(txn: &dyn ReadTxn) -> Result<Vec<(Account, AccountInfo, Epoch)>, StoreError> {
        let mut result = Vec::new();
        for (table, epoch) in [
            (Table::AccountsV0, Epoch::Epoch0),
            (Table::AccountsV1, Epoch::Epoch1),
        ] {
            for (key, value) in txn.iter(table)? {
                let bytes: [u8; 32] = key
                    .try_into()
                    .map_err(|_| StoreError::Backend("malformed account key".into()))?;
                result.push((Account::new(bytes), bincode::deserialize(&value)?, epoch));
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemStore, Store};

    fn sample_info() -> AccountInfo {
        AccountInfo {
            head: BlockHash::new([1u8; 32]),
            rep_block: BlockHash::new([2u8; 32]),
            open_block: BlockHash::new([3u8; 32]),
            balance: Amount::raw(1000),
            modified: 12345,
            block_count: 3,
        }
    }

    #[test]
    fn put_get_round_trip() {
        let store = MemStore::new();
        let account = Account::new([9u8; 32]);
        let mut txn = store.tx_begin_write().unwrap();
        AccountTable::put(txn.as_mut(), &account, &sample_info(), Epoch::Epoch0).unwrap();
        let (info, epoch) = AccountTable::get(txn.as_read(), &account).unwrap().unwrap();
        assert_eq!(info, sample_info());
        assert_eq!(epoch, Epoch::Epoch0);
    }

    #[test]
    fn epoch_upgrade_moves_row() {
        let store = MemStore::new();
        let account = Account::new([9u8; 32]);
        let mut txn = store.tx_begin_write().unwrap();
        AccountTable::put(txn.as_mut(), &account, &sample_info(), Epoch::Epoch0).unwrap();
        AccountTable::put(txn.as_mut(), &account, &sample_info(), Epoch::Epoch1).unwrap();

        let (_, epoch) = AccountTable::get(txn.as_read(), &account).unwrap().unwrap();
        assert_eq!(epoch, Epoch::Epoch1);
        assert_eq!(AccountTable::count(txn.as_read()).unwrap(), 1);
    }

    #[test]
    fn missing_account_is_none() {
        let store = MemStore::new();
        let txn = store.tx_begin_read().unwrap();
        assert!(AccountTable::get(txn.as_ref(), &Account::new([1u8; 32]))
            .unwrap()
            .is_none());
    }
}
