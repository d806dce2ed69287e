//! The ledger — a deterministic state machine over the block lattice.
//!
//! `Ledger::process` accepts or rejects one block with a precise result
//! code, updating account chains, pending entries and representative
//! weights under the caller's write transaction. `Ledger::rollback` undoes
//! blocks head-first, cascading across chains when an undone send has
//! already been received.

pub mod constants;
pub mod genesis;
pub mod ledger;
pub mod result;
mod rollback;

pub use constants::LedgerConstants;
pub use genesis::Genesis;
pub use ledger::Ledger;
pub use result::{ProcessResult, ProcessReturn};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("block {0} not found")]
    BlockNotFound(almond_types::BlockHash),

    #[error("account {0} not found")]
    AccountNotFound(almond_types::Account),

    #[error("store error: {0}")]
    Store(#[from] almond_store::StoreError),

    #[error("ledger corruption: {0}")]
    Corruption(String),
}
