//! A single election over one conflict root.

use std::collections::HashMap;
use std::sync::Arc;

use almond_blocks::Block;
use almond_types::{Account, Amount, BlockHash, QualifiedRoot};

use crate::vote::VoteCode;

/// Sentinel voter for the election's own initial entry; compares unequal to
/// every real account.
pub const NOT_AN_ACCOUNT: Account = Account::new([0xFF; 32]);

/// Quorum parameters, fixed per node from configuration.
#[derive(Clone, Copy, Debug)]
pub struct QuorumConfig {
    /// Weight assumed online when the observed online weight is higher.
    pub online_weight_minimum: Amount,
    /// Percent of the reference weight a winner must exceed.
    pub online_weight_quorum: u8,
}

impl QuorumConfig {
    /// The tally a candidate must exceed: `quorum%` of the lesser of the
    /// live online weight and the configured minimum.
    pub fn threshold(&self, online_weight: Amount) -> Amount {
        let reference = online_weight.min(self.online_weight_minimum);
        Amount::raw(reference.number() / 100 * self.online_weight_quorum as u128)
    }
}

/// Latest vote seen from one representative.
#[derive(Clone, Debug)]
pub struct VoteInfo {
    /// Seconds since the epoch when the vote arrived.
    pub time: u64,
    pub sequence: u64,
    pub hash: BlockHash,
    pub weight: Amount,
}

/// One open election.
pub struct Election {
    pub root: QualifiedRoot,
    /// Candidate blocks under this root, by hash.
    pub blocks: HashMap<BlockHash, Arc<Block>>,
    /// Latest vote per representative; strict sequence ordering.
    pub last_votes: HashMap<Account, VoteInfo>,
    /// Tally from the last recount.
    pub last_tally: HashMap<BlockHash, Amount>,
    pub confirmed: bool,
    /// Announcement rounds already spent on this election.
    pub announcements: u32,
    /// Highest proof-of-work difficulty observed across candidates.
    pub difficulty: u64,
}

impl Election {
    pub fn new(block: Arc<Block>, difficulty: u64, now: u64) -> Self {
        let hash = block.hash();
        let root = block.qualified_root();
        let mut blocks = HashMap::new();
        blocks.insert(hash, block);

        // The node's own placeholder entry; it keeps the initial candidate
        // alive in the tally until real representatives weigh in.
        let mut last_votes = HashMap::new();
        last_votes.insert(
            NOT_AN_ACCOUNT,
            VoteInfo {
                time: now,
                sequence: 0,
                hash,
                weight: Amount::ZERO,
            },
        );

        Self {
            root,
            blocks,
            last_votes,
            last_tally: HashMap::new(),
            confirmed: false,
            announcements: 0,
            difficulty,
        }
    }

    /// Add an alternate candidate for the same root.
    pub fn insert_candidate(&mut self, block: Arc<Block>) {
        self.blocks.entry(block.hash()).or_insert(block);
    }

    /// Raise the recorded difficulty when a higher-work copy of a candidate
    /// shows up.
    pub fn raise_difficulty(&mut self, difficulty: u64) {
        if difficulty > self.difficulty {
            self.difficulty = difficulty;
        }
    }

    /// Record a vote for one candidate hash. Latest-vote-wins by strict
    /// sequence comparison.
    pub fn vote(
        &mut self,
        voter: Account,
        sequence: u64,
        hash: BlockHash,
        weight: Amount,
        now: u64,
    ) -> VoteCode {
        if let Some(existing) = self.last_votes.get(&voter) {
            if sequence <= existing.sequence {
                return VoteCode::Replay;
            }
        }
        self.last_votes.insert(
            voter,
            VoteInfo {
                time: now,
                sequence,
                hash,
                weight,
            },
        );
        VoteCode::Vote
    }

    /// Recompute the weighted tally partitioned by candidate hash.
    pub fn tally(&mut self) -> &HashMap<BlockHash, Amount> {
        let mut tally: HashMap<BlockHash, Amount> = HashMap::new();
        for info in self.last_votes.values() {
            let entry = tally.entry(info.hash).or_insert(Amount::ZERO);
            *entry = entry.saturating_add(info.weight);
        }
        self.last_tally = tally;
        &self.last_tally
    }

    /// The current winner: highest tally, ties broken by hash so every node
    /// agrees without communication.
    pub fn winner(&mut self) -> Option<(BlockHash, Amount)> {
        self.tally();
        self.last_tally
            .iter()
            .max_by(|(hash_a, weight_a), (hash_b, weight_b)| {
                weight_a.cmp(weight_b).then_with(|| hash_a.cmp(hash_b))
            })
            .map(|(hash, weight)| (*hash, *weight))
    }

    /// Whether the winner clears quorum against the given online weight.
    pub fn have_quorum(&mut self, quorum: &QuorumConfig, online_weight: Amount) -> bool {
        let threshold = quorum.threshold(online_weight);
        match self.winner() {
            Some((_, tally)) => tally > threshold,
            None => false,
        }
    }
}
