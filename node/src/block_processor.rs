//! The block processor.
//!
//! A serialized, backpressured pipeline: blocks queue in from the network
//! and wallet, signatures are verified in batches, and everything applies
//! to the ledger under one write transaction per batch. Forks hand the
//! competing blocks to active elections; gaps queue into the unchecked
//! table until their dependency arrives.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use almond_blocks::{Block, BlockUniquer};
use almond_consensus::ActiveElections;
use almond_ledger::{Ledger, ProcessResult};
use almond_store::{
    SignatureVerification, Store, UncheckedInfo, UncheckedTable, WriteTxn,
};
use almond_types::BlockHash;

use crate::stats::Stats;

/// Delay before the first confirm_req for a freshly processed block, to let
/// normal propagation settle first.
pub const CONFIRMATION_REQUEST_DELAY: Duration = Duration::from_millis(1500);

/// Queued blocks above which `full()` reports backpressure.
const QUEUE_HIGH_WATERMARK: usize = 16 * 1024;

/// Size of the rolled-back ring used to notice immediate re-forks.
const ROLLED_BACK_MAX: usize = 1024;

/// State blocks batch-verified per signature-check round.
const VERIFY_BATCH_MAX: usize = 4096;

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Everything the processor needs, injected to keep the node acyclic.
pub struct ProcessorContext {
    pub store: Arc<dyn Store>,
    pub ledger: Arc<Ledger>,
    pub active: Arc<ActiveElections>,
    pub stats: Arc<Stats>,
    pub uniquer: Arc<BlockUniquer>,
    /// Minimum work difficulty for ingested blocks.
    pub publish_threshold: u64,
    /// Upper bound on one batch's write transaction.
    pub batch_max_time: Duration,
}

/// Ring of recently rolled back hashes.
struct RolledBackRing {
    order: VecDeque<BlockHash>,
    set: HashSet<BlockHash>,
}

impl RolledBackRing {
    fn new() -> Self {
        Self {
            order: VecDeque::with_capacity(ROLLED_BACK_MAX),
            set: HashSet::with_capacity(ROLLED_BACK_MAX),
        }
    }

    fn insert(&mut self, hash: BlockHash) {
        if self.set.contains(&hash) {
            return;
        }
        if self.order.len() >= ROLLED_BACK_MAX {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        self.order.push_back(hash);
        self.set.insert(hash);
    }

    fn contains(&self, hash: &BlockHash) -> bool {
        self.set.contains(hash)
    }
}

/// A queued block with the proof-of-work difficulty observed at ingest.
/// The difficulty is captured before uniquing: a re-broadcast with a better
/// nonce collapses onto the known instance, but its difficulty must still
/// reach the election.
struct QueueItem {
    info: UncheckedInfo,
    difficulty: u64,
}

struct ProcessorState {
    /// State blocks: cheap to batch-verify.
    state_blocks: VecDeque<QueueItem>,
    /// Legacy blocks: verified individually inside the ledger.
    blocks: VecDeque<QueueItem>,
    /// Blocks that must displace a conflicting chain head; drained first.
    forced: VecDeque<Arc<Block>>,
    /// Hashes currently queued, for ingest dedup.
    blocks_hashes: HashSet<BlockHash>,
    rolled_back: RolledBackRing,
    /// A batch is being applied right now.
    active: bool,
}

/// The serialized block application pipeline.
pub struct BlockProcessor {
    ctx: ProcessorContext,
    state: Mutex<ProcessorState>,
    condition: Condvar,
    stopped: AtomicBool,
}

impl BlockProcessor {
    pub fn new(ctx: ProcessorContext) -> Self {
        Self {
            ctx,
            state: Mutex::new(ProcessorState {
                state_blocks: VecDeque::new(),
                blocks: VecDeque::new(),
                forced: VecDeque::new(),
                blocks_hashes: HashSet::new(),
                rolled_back: RolledBackRing::new(),
                active: false,
            }),
            condition: Condvar::new(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Submit a block for processing. Insufficient work or a duplicate in
    /// the queue drops it immediately.
    pub fn add(&self, block: Arc<Block>) {
        let difficulty =
            match almond_work::work_validate_block(&block, self.ctx.publish_threshold) {
                Ok(difficulty) => difficulty,
                Err(_) => {
                    self.ctx.stats.inc("processor.insufficient_work");
                    tracing::debug!(hash = %block.hash(), "dropping block with insufficient work");
                    return;
                }
            };
        let block = self.ctx.uniquer.unique(block);
        let item = QueueItem {
            info: UncheckedInfo::new((*block).clone(), unix_now()),
            difficulty,
        };
        let mut state = self.state.lock().expect("block processor poisoned");
        if !state.blocks_hashes.insert(block.hash()) {
            // Already queued; a better nonce still reprioritizes.
            drop(state);
            self.ctx.active.update_difficulty(&block.hash(), difficulty);
            return;
        }
        match &*block {
            Block::State(_) => state.state_blocks.push_back(item),
            _ => state.blocks.push_back(item),
        }
        drop(state);
        self.condition.notify_all();
    }

    /// Submit a block that must win its chain position: any conflicting head
    /// is rolled back before application. Used for election winners.
    pub fn force(&self, block: Arc<Block>) {
        let mut state = self.state.lock().expect("block processor poisoned");
        state.forced.push_back(block);
        drop(state);
        self.condition.notify_all();
    }

    /// Backpressure signal for callers feeding from the network.
    pub fn full(&self) -> bool {
        let state = self.state.lock().expect("block processor poisoned");
        state.state_blocks.len() + state.blocks.len() > QUEUE_HIGH_WATERMARK
    }

    pub fn have_blocks(&self) -> bool {
        let state = self.state.lock().expect("block processor poisoned");
        !state.state_blocks.is_empty() || !state.blocks.is_empty() || !state.forced.is_empty()
    }

    /// Block until everything queued so far has been applied.
    pub fn flush(&self) {
        let mut state = self.state.lock().expect("block processor poisoned");
        while !self.stopped.load(Ordering::SeqCst)
            && (state.active
                || !state.state_blocks.is_empty()
                || !state.blocks.is_empty()
                || !state.forced.is_empty())
        {
            state = self
                .condition
                .wait(state)
                .expect("block processor poisoned");
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.condition.notify_all();
    }

    /// The consumer loop; runs on the `block_processing` thread until
    /// stopped.
    pub fn process_blocks(&self) {
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            if self.have_blocks() {
                self.process_batch();
            } else {
                let state = self.state.lock().expect("block processor poisoned");
                let _unused = self
                    .condition
                    .wait_timeout(state, Duration::from_millis(100))
                    .expect("block processor poisoned");
            }
        }
    }

    /// Apply one batch under a single write transaction.
    pub fn process_batch(&self) {
        {
            let mut state = self.state.lock().expect("block processor poisoned");
            state.active = true;
        }
        let result = self.process_batch_inner();
        {
            let mut state = self.state.lock().expect("block processor poisoned");
            state.active = false;
        }
        self.condition.notify_all();
        if let Err(err) = result {
            tracing::error!(error = %err, "block batch failed; batch retried on next round");
        }
    }

    fn process_batch_inner(&self) -> Result<(), almond_store::StoreError> {
        let deadline = Instant::now() + self.ctx.batch_max_time;
        let mut txn = self.ctx.store.tx_begin_write()?;
        self.ctx.stats.inc("processor.batch");

        // Forced blocks first: evict the conflicting head, then apply.
        loop {
            let forced = {
                let mut state = self.state.lock().expect("block processor poisoned");
                state.forced.pop_front()
            };
            let Some(block) = forced else { break };
            self.process_forced(txn.as_mut(), &block);
        }

        self.verify_state_blocks();

        while Instant::now() < deadline {
            let item = {
                let mut state = self.state.lock().expect("block processor poisoned");
                let item = state
                    .blocks
                    .pop_front()
                    .or_else(|| state.state_blocks.pop_front());
                if let Some(item) = &item {
                    state.blocks_hashes.remove(&item.info.block.hash());
                }
                item
            };
            let Some(item) = item else { break };
            self.process_one(txn.as_mut(), item);
        }

        txn.commit()?;
        Ok(())
    }

    /// Batch-verify the signatures of every queued state block, dropping the
    /// invalid ones before they reach the ledger.
    fn verify_state_blocks(&self) {
        let batch: Vec<QueueItem> = {
            let mut state = self.state.lock().expect("block processor poisoned");
            let count = state.state_blocks.len().min(VERIFY_BATCH_MAX);
            state.state_blocks.drain(..count).collect()
        };
        if batch.is_empty() {
            return;
        }

        let hashes: Vec<BlockHash> = batch.iter().map(|item| item.info.block.hash()).collect();
        let mut messages: Vec<&[u8]> = Vec::with_capacity(batch.len());
        let mut accounts = Vec::with_capacity(batch.len());
        let mut signatures = Vec::with_capacity(batch.len());
        for (item, hash) in batch.iter().zip(&hashes) {
            let Block::State(state_block) = &item.info.block else {
                continue;
            };
            messages.push(hash.as_bytes());
            let signer = if self.ctx.ledger.is_epoch_link(&state_block.link) {
                self.ctx.ledger.constants.epoch_signer
            } else {
                state_block.account
            };
            accounts.push(signer);
            signatures.push(*item.info.block.signature());
        }

        let results = almond_crypto::validate_message_batch(&messages, &accounts, &signatures);

        let mut state = self.state.lock().expect("block processor poisoned");
        for (mut item, valid) in batch.into_iter().zip(results) {
            if valid {
                let Block::State(state_block) = &item.info.block else {
                    continue;
                };
                item.info.verified = if self.ctx.ledger.is_epoch_link(&state_block.link) {
                    SignatureVerification::ValidEpoch
                } else {
                    SignatureVerification::Valid
                };
                state.state_blocks.push_back(item);
            } else {
                state.blocks_hashes.remove(&item.info.block.hash());
                self.ctx.stats.inc("ledger.bad_signature");
                tracing::debug!(hash = %item.info.block.hash(), "state block failed batch signature verification");
            }
        }
    }

    fn process_forced(&self, txn: &mut dyn WriteTxn, block: &Arc<Block>) {
        self.ctx.stats.inc("processor.forced");
        let hash = block.hash();
        let root = block.root();

        // If another block occupies this chain position, roll it back first.
        let successor = if block.previous().is_zero() {
            self.ctx
                .ledger
                .forked_block(txn.as_read(), block)
                .map(|sibling| sibling.hash())
        } else {
            almond_store::BlockTable::successor(txn.as_read(), &block.previous())
                .ok()
                .flatten()
        };

        if let Some(conflicting) = successor {
            if conflicting != hash {
                match self.ctx.ledger.rollback(txn, &conflicting) {
                    Ok(rolled) => {
                        self.ctx.stats.add("ledger.rollback", rolled.len() as u64);
                        let mut state = self.state.lock().expect("block processor poisoned");
                        for undone in &rolled {
                            state.rolled_back.insert(undone.hash());
                        }
                        tracing::info!(
                            winner = %hash,
                            loser = %conflicting,
                            count = rolled.len(),
                            root = %root,
                            "rolled back losing fork"
                        );
                    }
                    Err(err) => {
                        tracing::error!(error = %err, hash = %conflicting, "forced rollback failed");
                        return;
                    }
                }
            }
        }

        let difficulty = almond_work::work_value(&block.root(), block.work());
        self.process_one(
            txn,
            QueueItem {
                info: UncheckedInfo::new((**block).clone(), unix_now()),
                difficulty,
            },
        );
    }

    fn process_one(&self, txn: &mut dyn WriteTxn, item: QueueItem) {
        let QueueItem { info, difficulty } = item;
        let block = info.block.clone();
        let hash = block.hash();
        let result = match self.ctx.ledger.process(txn, &block, info.verified) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, hash = %hash, "store failure applying block");
                return;
            }
        };

        match result.code {
            ProcessResult::Progress => {
                self.ctx.stats.inc("ledger.progress");
                tracing::debug!(hash = %hash, account = %result.account, "block applied");
                // Anything that was waiting on this hash can now proceed.
                self.queue_unchecked(txn, &hash);
                self.ctx.stats.inc("election.started");
                let shared = self.ctx.uniquer.unique(Arc::new(block));
                self.ctx.active.start(shared, difficulty, unix_now());
            }
            ProcessResult::GapPrevious => {
                self.ctx.stats.inc("ledger.gap_previous");
                let previous = block.previous();
                let _ = UncheckedTable::put(txn, &previous, &info);
            }
            ProcessResult::GapSource => {
                self.ctx.stats.inc("ledger.gap_source");
                let dependency = match &block {
                    Block::Receive(receive) => receive.source,
                    Block::Open(open) => open.source,
                    Block::State(state) => state.link,
                    _ => BlockHash::ZERO,
                };
                if !dependency.is_zero() {
                    let _ = UncheckedTable::put(txn, &dependency, &info);
                }
            }
            ProcessResult::Fork => {
                self.ctx.stats.inc("ledger.fork");
                let shared = self.ctx.uniquer.unique(Arc::new(block));
                // Put the block already on the chain up for election, with
                // the newcomer as challenger.
                if let Some(sibling) = self.ctx.ledger.forked_block(txn.as_read(), &shared) {
                    let sibling = self.ctx.uniquer.unique(Arc::new(sibling));
                    let sibling_difficulty =
                        almond_work::work_value(&sibling.root(), sibling.work());
                    self.ctx.active.start(sibling, sibling_difficulty, unix_now());
                }
                self.ctx.active.start(shared.clone(), difficulty, unix_now());
                tracing::warn!(hash = %hash, root = %shared.root(), "fork detected");
            }
            ProcessResult::Old => {
                self.ctx.stats.inc("ledger.old");
                // A re-broadcast of a known block can still raise its
                // election's priority when it carries better work.
                self.ctx.active.update_difficulty(&hash, difficulty);
            }
            ProcessResult::BadSignature => self.ctx.stats.inc("ledger.bad_signature"),
            ProcessResult::NegativeSpend => self.ctx.stats.inc("ledger.negative_spend"),
            ProcessResult::Unreceivable => self.ctx.stats.inc("ledger.unreceivable"),
            ProcessResult::OpenedBurnAccount => self.ctx.stats.inc("ledger.opened_burn_account"),
            ProcessResult::BalanceMismatch => self.ctx.stats.inc("ledger.balance_mismatch"),
            ProcessResult::RepresentativeMismatch => {
                self.ctx.stats.inc("ledger.representative_mismatch")
            }
            ProcessResult::BlockPosition => self.ctx.stats.inc("ledger.block_position"),
        }
    }

    /// Requeue unchecked blocks whose dependency just landed.
    fn queue_unchecked(&self, txn: &mut dyn WriteTxn, dependency: &BlockHash) {
        let dependents = match UncheckedTable::pop_dependents(txn, dependency) {
            Ok(dependents) => dependents,
            Err(err) => {
                tracing::error!(error = %err, "failed to drain unchecked dependents");
                return;
            }
        };
        if dependents.is_empty() {
            return;
        }
        self.ctx
            .stats
            .add("processor.unchecked_requeued", dependents.len() as u64);
        let mut state = self.state.lock().expect("block processor poisoned");
        for info in dependents {
            if !state.blocks_hashes.insert(info.block.hash()) {
                continue;
            }
            let difficulty = almond_work::work_value(&info.block.root(), info.block.work());
            let item = QueueItem { info, difficulty };
            match &item.info.block {
                Block::State(_) => state.state_blocks.push_back(item),
                _ => state.blocks.push_back(item),
            }
        }
    }

    /// Whether a hash was rolled back recently (re-fork detection).
    pub fn recently_rolled_back(&self, hash: &BlockHash) -> bool {
        self.state
            .lock()
            .expect("block processor poisoned")
            .rolled_back
            .contains(hash)
    }

    /// Drain every queued block synchronously. Tests and the wallet commit
    /// path use this instead of the consumer thread.
    pub fn drain(&self) {
        while self.have_blocks() {
            self.process_batch();
        }
    }
}
