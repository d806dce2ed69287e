#![allow(dead_code)]

//! Shared node test fixture: a test-network node over an in-memory store.

use std::sync::Arc;

use almond_blocks::{Block, SendBlock};
use almond_crypto::KeyPair;
use almond_ledger::genesis::TEST_GENESIS_KEY;
use almond_ledger::ProcessResult;
use almond_node::{Node, NodeConfig, NodeFlags};
use almond_store::{MemStore, SignatureVerification, Store};
use almond_types::{Account, Amount, BlockHash, Networks, RawKey};

pub struct TestNode {
    pub node: Arc<Node>,
    pub genesis_key: KeyPair,
}

impl TestNode {
    pub fn new() -> Self {
        let config = NodeConfig::for_network(Networks::Test);
        let store: Arc<dyn Store> = Arc::new(MemStore::new());
        let node = Node::new(config, NodeFlags::default(), store).unwrap();
        Self {
            node,
            genesis_key: KeyPair::from_raw(RawKey::new(TEST_GENESIS_KEY)),
        }
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.node.ledger.constants.genesis.hash()
    }

    pub fn threshold(&self) -> u64 {
        Networks::Test.publish_threshold()
    }

    /// A signed send with valid work, drawing `amount` raw off the chain
    /// ending at `previous`.
    pub fn send_block(
        &self,
        previous: BlockHash,
        previous_balance: Amount,
        destination: Account,
        amount: u128,
    ) -> Arc<Block> {
        let mut block = Block::Send(SendBlock::new(
            previous,
            destination,
            previous_balance.checked_sub(Amount::raw(amount)).unwrap(),
            &self.genesis_key.secret,
            0,
        ));
        let work = self
            .node
            .work_pool
            .generate_blocking(block.root(), self.threshold())
            .unwrap();
        block.set_work(work);
        Arc::new(block)
    }

    /// Apply a block straight through the ledger, the way bootstrapped
    /// blocks land, without touching elections.
    pub fn process_direct(&self, block: &Block) -> ProcessResult {
        let mut txn = self.node.store.tx_begin_write().unwrap();
        let result = self
            .node
            .ledger
            .process(txn.as_mut(), block, SignatureVerification::Unknown)
            .unwrap();
        txn.commit().unwrap();
        result.code
    }

    /// Submit through the live pipeline and wait for it to drain.
    pub fn process_active(&self, block: Arc<Block>) {
        self.node.process_active(block);
        self.node.processor.drain();
    }
}
