//! Abstract storage for the almond ledger.
//!
//! The ledger and node speak to storage through byte-oriented transaction
//! traits plus typed table views. A write transaction is exclusive and spans
//! every logical table, which is what lets the block processor apply a whole
//! batch atomically; read transactions see a point-in-time snapshot.
//!
//! Backends: [`MemStore`] (in-memory, used by tests) here, LMDB in
//! `almond-store-lmdb`.

pub mod account;
pub mod block;
pub mod error;
pub mod frontier;
pub mod mem;
pub mod meta;
pub mod peer;
pub mod pending;
pub mod rep_weights;
pub mod unchecked;
pub mod vote;

pub use account::{AccountInfo, AccountTable};
pub use block::{BlockTable, StoredBlock};
pub use error::StoreError;
pub use frontier::FrontierTable;
pub use mem::MemStore;
pub use meta::MetaTable;
pub use peer::PeerTable;
pub use pending::{PendingInfo, PendingKey, PendingTable};
pub use rep_weights::RepWeightTable;
pub use unchecked::{SignatureVerification, UncheckedInfo, UncheckedTable};
pub use vote::VoteTable;

use serde::{Deserialize, Serialize};

/// Every logical table in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    AccountsV0,
    AccountsV1,
    SendBlocks,
    ReceiveBlocks,
    OpenBlocks,
    ChangeBlocks,
    StateBlocksV0,
    StateBlocksV1,
    PendingV0,
    PendingV1,
    Unchecked,
    Representation,
    Votes,
    Peers,
    Frontier,
    Meta,
}

impl Table {
    /// All tables, in creation order.
    pub const ALL: [Table; 16] = [
        Table::AccountsV0,
        Table::AccountsV1,
        Table::SendBlocks,
        Table::ReceiveBlocks,
        Table::OpenBlocks,
        Table::ChangeBlocks,
        Table::StateBlocksV0,
        Table::StateBlocksV1,
        Table::PendingV0,
        Table::PendingV1,
        Table::Unchecked,
        Table::Representation,
        Table::Votes,
        Table::Peers,
        Table::Frontier,
        Table::Meta,
    ];

    /// Stable on-disk database name.
    pub fn name(&self) -> &'static str {
        match self {
            Table::AccountsV0 => "accounts_v0",
            Table::AccountsV1 => "accounts_v1",
            Table::SendBlocks => "send",
            Table::ReceiveBlocks => "receive",
            Table::OpenBlocks => "open",
            Table::ChangeBlocks => "change",
            Table::StateBlocksV0 => "state_v0",
            Table::StateBlocksV1 => "state_v1",
            Table::PendingV0 => "pending_v0",
            Table::PendingV1 => "pending_v1",
            Table::Unchecked => "unchecked",
            Table::Representation => "representation",
            Table::Votes => "votes",
            Table::Peers => "peers",
            Table::Frontier => "frontier",
            Table::Meta => "meta",
        }
    }
}

/// A read-only view of the store. Snapshot-isolated.
pub trait ReadTxn {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn exists(&self, table: Table, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(table, key)?.is_some())
    }

    /// All entries whose key starts with `prefix`, in key order.
    fn prefix(&self, table: Table, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    /// All entries of a table, in key order.
    fn iter(&self, table: Table) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.prefix(table, &[])
    }

    fn count(&self, table: Table) -> Result<u64, StoreError>;
}

/// An exclusive read-write transaction. Dropping without [`WriteTxn::commit`]
/// aborts every staged operation.
pub trait WriteTxn: ReadTxn {
    fn put(&mut self, table: Table, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn delete(&mut self, table: Table, key: &[u8]) -> Result<(), StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// View this transaction through the read interface.
    fn as_read(&self) -> &dyn ReadTxn;
}

/// A storage backend.
pub trait Store: Send + Sync {
    fn tx_begin_read(&self) -> Result<Box<dyn ReadTxn + '_>, StoreError>;

    fn tx_begin_write(&self) -> Result<Box<dyn WriteTxn + '_>, StoreError>;
}
