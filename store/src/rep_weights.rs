//! The representation table: representative account → delegated weight.

use almond_types::{Account, Amount};

use crate::{ReadTxn, StoreError, Table, WriteTxn};

/// Typed view over the representation table.
pub struct RepWeightTable;

impl RepWeightTable {
    pub fn get(txn: &dyn ReadTxn, representative: &Account) -> Result<Amount, StoreError> {
        match txn.get(Table::Representation, representative.as_bytes())? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(Amount::ZERO),
        }
    }

    pub fn put(
        txn: &mut dyn WriteTxn,
        representative: &Account,
        weight: Amount,
    ) -> Result<(), StoreError> {
        if weight.is_zero() {
            // Zero rows are deleted so the table stays proportional to the
            // set of representatives actually holding weight.
            txn.delete(Table::Representation, representative.as_bytes())
        } else {
            let bytes = bincode::serialize(&weight)?;
            txn.put(Table::Representation, representative.as_bytes(), &bytes)
        }
    }

    /// Add to a representative's weight.
    pub fn add(
        txn: &mut dyn WriteTxn,
        representative: &Account,
        amount: Amount,
    ) -> Result<(), StoreError> {
        let current = Self::get(txn.as_read(), representative)?;
        Self::put(txn, representative, current.saturating_add(amount))
    }

    /// Subtract from a representative's weight.
    pub fn sub(
        txn: &mut dyn WriteTxn,
        representative: &Account,
        amount: Amount,
    ) -> Result<(), StoreError> {
        let current = Self::get(txn.as_read(), representative)?;
        Self::put(txn, representative, current.saturating_sub(amount))
    }

    /// Every representative with non-zero weight.
    pub fn iter(txn: &dyn ReadTxn) -> Result<Vec<(Account, Amount)>, StoreError> {
        txn.iter(Table::Representation)?
            .into_iter()
            .map(|(key, value)| {
                let bytes: [u8; 32] = key
                    .try_into()
                    .map_err(|_| StoreError::Backend("malformed representation key".into()))?;
                Ok((Account::new(bytes), bincode::deserialize(&value)?))
            })
            .collect()
    }
}
