#![allow(dead_code)]

//! Shared ledger test fixture.

use almond_blocks::Block;
use almond_crypto::KeyPair;
use almond_ledger::genesis::TEST_GENESIS_KEY;
use almond_ledger::{Ledger, LedgerConstants, ProcessResult, ProcessReturn};
use almond_store::{MemStore, SignatureVerification, Store};
use almond_types::{Account, Amount, RawKey};

pub struct Fixture {
    pub store: MemStore,
    pub ledger: Ledger,
    pub genesis_key: KeyPair,
}

impl Fixture {
    pub fn new() -> Self {
        let store = MemStore::new();
        let ledger = Ledger::new(LedgerConstants::test());
        let mut txn = store.tx_begin_write().unwrap();
        ledger.initialize(txn.as_mut()).unwrap();
        txn.commit().unwrap();
        Self {
            store,
            ledger,
            genesis_key: KeyPair::from_raw(RawKey::new(TEST_GENESIS_KEY)),
        }
    }

    pub fn genesis_account(&self) -> Account {
        self.genesis_key.public
    }

    /// Apply a block in its own committed write transaction.
    pub fn process(&self, block: &Block) -> ProcessResult {
        self.process_return(block).code
    }

    pub fn process_return(&self, block: &Block) -> ProcessReturn {
        let mut txn = self.store.tx_begin_write().unwrap();
        let result = self
            .ledger
            .process(txn.as_mut(), block, SignatureVerification::Unknown)
            .unwrap();
        txn.commit().unwrap();
        result
    }

    /// Apply with the signature already vouched for (the batch-verified path).
    pub fn process_verified(&self, block: &Block) -> ProcessResult {
        let mut txn = self.store.tx_begin_write().unwrap();
        let result = self
            .ledger
            .process(txn.as_mut(), block, SignatureVerification::Valid)
            .unwrap();
        txn.commit().unwrap();
        result.code
    }

    pub fn rollback(&self, hash: &almond_types::BlockHash) -> Vec<Block> {
        let mut txn = self.store.tx_begin_write().unwrap();
        let rolled = self.ledger.rollback(txn.as_mut(), hash).unwrap();
        txn.commit().unwrap();
        rolled
    }

    pub fn balance(&self, account: &Account) -> Amount {
        let txn = self.store.tx_begin_read().unwrap();
        self.ledger.account_balance(txn.as_ref(), account)
    }

    pub fn weight(&self, representative: &Account) -> Amount {
        let txn = self.store.tx_begin_read().unwrap();
        self.ledger.weight(txn.as_ref(), representative)
    }

    /// Σ representative weights + Σ unclaimed pending amounts. Must always
    /// equal the genesis amount.
    pub fn circulating_total(&self) -> Amount {
        let txn = self.store.tx_begin_read().unwrap();
        let weights = almond_store::RepWeightTable::iter(txn.as_ref())
            .unwrap()
            .into_iter()
            .fold(Amount::ZERO, |sum, (_, weight)| sum.saturating_add(weight));
        let pending = almond_store::PendingTable::iter(txn.as_ref())
            .unwrap()
            .into_iter()
            .fold(Amount::ZERO, |sum, (_, info)| {
                sum.saturating_add(info.amount)
            });
        weights.saturating_add(pending)
    }
}
