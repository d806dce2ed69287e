//! Active elections — the concurrent map of open conflicts.
//!
//! Keyed by qualified root. `start` is idempotent per root: a second block
//! under the same root joins the existing election as an alternate
//! candidate. Votes route to every election whose candidate set intersects
//! the vote's hashes; votes with no home land in the vote cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use almond_blocks::Block;
use almond_types::{Amount, BlockHash, QualifiedRoot};

use crate::election::{Election, QuorumConfig};
use crate::vote::{Vote, VoteCode};
use crate::vote_cache::VoteCache;

/// Announcement rounds before an unconfirmed election is reaped.
pub const ANNOUNCEMENT_MAX: u32 = 20;

/// A confirmed election's outcome.
#[derive(Clone, Debug)]
pub struct ElectionStatus {
    pub root: QualifiedRoot,
    pub winner: Arc<Block>,
    pub tally: Amount,
    /// Candidates that lost and should be rolled back if applied.
    pub losers: Vec<Arc<Block>>,
}

struct ActiveInner {
    roots: HashMap<QualifiedRoot, Election>,
    /// Candidate hash → owning root.
    blocks: HashMap<BlockHash, QualifiedRoot>,
    vote_cache: VoteCache,
}

/// The election container.
pub struct ActiveElections {
    quorum: QuorumConfig,
    inner: Mutex<ActiveInner>,
}

impl ActiveElections {
    pub fn new(quorum: QuorumConfig) -> Self {
        Self {
            quorum,
            inner: Mutex::new(ActiveInner {
                roots: HashMap::new(),
                blocks: HashMap::new(),
                vote_cache: VoteCache::new(),
            }),
        }
    }

    /// Start (or join) the election for a block's root. Returns `true` when
    /// an election for the root already existed.
    pub fn start(&self, block: Arc<Block>, difficulty: u64, now: u64) -> bool {
        let root = block.qualified_root();
        let hash = block.hash();
        let mut inner = self.inner.lock().expect("active elections poisoned");

        let existed = inner.roots.contains_key(&root);
        if existed {
            let election = inner.roots.get_mut(&root).expect("checked above");
            election.insert_candidate(block);
            election.raise_difficulty(difficulty);
        } else {
            let election = Election::new(block, difficulty, now);
            inner.roots.insert(root, election);
        }
        inner.blocks.insert(hash, root);

        // Replay any votes that arrived ahead of the election.
        let cached = inner.vote_cache.take(&hash);
        if !cached.is_empty() {
            let election = inner.roots.get_mut(&root).expect("just inserted");
            for vote in cached {
                election.vote(vote.voter, vote.sequence, hash, vote.weight, now);
            }
        }

        existed
    }

    /// Route a vote to every election its hashes touch. Hashes with no
    /// election are cached. Returns `VoteCode::Replay` only when every
    /// touched election judged the vote a replay.
    pub fn vote(&self, vote: &Vote, weight: Amount, now: u64) -> VoteCode {
        let mut inner = self.inner.lock().expect("active elections poisoned");
        let mut any_counted = false;
        let mut any_election = false;

        for hash in vote.hashes() {
            match inner.blocks.get(&hash).copied() {
                Some(root) => {
                    any_election = true;
                    if let Some(election) = inner.roots.get_mut(&root) {
                        if election.vote(vote.account, vote.sequence, hash, weight, now)
                            == VoteCode::Vote
                        {
                            any_counted = true;
                        }
                    }
                }
                None => {
                    inner
                        .vote_cache
                        .insert(hash, vote.account, vote.sequence, weight);
                }
            }
        }

        if any_counted || !any_election {
            VoteCode::Vote
        } else {
            VoteCode::Replay
        }
    }

    /// Sweep all elections: confirm winners that clear quorum, reap
    /// elections that ran out of announcement rounds. Returns the confirmed
    /// outcomes; the caller applies winners and rolls losers back.
    pub fn tally_round(&self, online_weight: Amount) -> Vec<ElectionStatus> {
        let mut inner = self.inner.lock().expect("active elections poisoned");
        let mut confirmed = Vec::new();
        let mut finished: Vec<QualifiedRoot> = Vec::new();

        for (root, election) in inner.roots.iter_mut() {
            if election.confirmed {
                continue;
            }
            if election.have_quorum(&self.quorum, online_weight) {
                election.confirmed = true;
                if let Some((winner_hash, tally)) = election.winner() {
                    if let Some(winner) = election.blocks.get(&winner_hash).cloned() {
                        let losers = election
                            .blocks
                            .iter()
                            .filter(|(hash, _)| **hash != winner_hash)
                            .map(|(_, block)| block.clone())
                            .collect();
                        confirmed.push(ElectionStatus {
                            root: *root,
                            winner,
                            tally,
                            losers,
                        });
                    }
                }
                finished.push(*root);
            }
        }

        for root in finished {
            Self::erase_locked(&mut inner, &root);
        }
        confirmed
    }

    /// Elections to re-announce, hardest proof-of-work first, capped at
    /// `limit`. Bumps announcement counters and reaps elections that have
    /// exhausted their rounds.
    pub fn announcements(&self, limit: usize) -> Vec<(QualifiedRoot, Vec<BlockHash>)> {
        let mut inner = self.inner.lock().expect("active elections poisoned");

        let mut order: Vec<(u64, QualifiedRoot)> = inner
            .roots
            .iter()
            .map(|(root, election)| (election.difficulty, *root))
            .collect();
        // Highest difficulty first; announcement bandwidth goes to the work
        // somebody paid the most for.
        order.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.to_bytes().cmp(&b.1.to_bytes())));

        let mut result = Vec::new();
        let mut reaped = Vec::new();
        for (_, root) in order.into_iter().take(limit) {
            let election = inner.roots.get_mut(&root).expect("root listed");
            election.announcements += 1;
            if election.announcements > ANNOUNCEMENT_MAX {
                reaped.push(root);
                continue;
            }
            result.push((root, election.blocks.keys().copied().collect()));
        }

        for root in &reaped {
            tracing::debug!(root = ?root, "election dropped after announcement cap");
            Self::erase_locked(&mut inner, root);
        }
        result
    }

    /// Raise the stored difficulty for the election containing `hash`.
    pub fn update_difficulty(&self, hash: &BlockHash, difficulty: u64) {
        let mut inner = self.inner.lock().expect("active elections poisoned");
        if let Some(root) = inner.blocks.get(hash).copied() {
            if let Some(election) = inner.roots.get_mut(&root) {
                election.raise_difficulty(difficulty);
            }
        }
    }

    /// Recorded difficulty of the election for `root`.
    pub fn difficulty(&self, root: &QualifiedRoot) -> Option<u64> {
        let inner = self.inner.lock().expect("active elections poisoned");
        inner.roots.get(root).map(|election| election.difficulty)
    }

    /// Latest votes of the election for `root`, for inspection.
    pub fn vote_count(&self, root: &QualifiedRoot) -> usize {
        let inner = self.inner.lock().expect("active elections poisoned");
        inner
            .roots
            .get(root)
            .map(|election| election.last_votes.len())
            .unwrap_or(0)
    }

    pub fn erase(&self, root: &QualifiedRoot) {
        let mut inner = self.inner.lock().expect("active elections poisoned");
        Self::erase_locked(&mut inner, root);
    }

    fn erase_locked(inner: &mut ActiveInner, root: &QualifiedRoot) {
        if let Some(election) = inner.roots.remove(root) {
            for hash in election.blocks.keys() {
                inner.blocks.remove(hash);
            }
        }
    }

    pub fn contains(&self, root: &QualifiedRoot) -> bool {
        self.inner
            .lock()
            .expect("active elections poisoned")
            .roots
            .contains_key(root)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().expect("active elections poisoned").roots.len()
    }

    pub fn cached_vote_count(&self) -> usize {
        self.inner
            .lock()
            .expect("active elections poisoned")
            .vote_cache
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vote::VotePayload;
    use almond_blocks::SendBlock;
    use almond_crypto::KeyPair;
    use almond_types::Account;

    fn quorum() -> QuorumConfig {
        QuorumConfig {
            online_weight_minimum: Amount::raw(1000),
            online_weight_quorum: 50,
        }
    }

    fn make_send(previous: u8, destination: u8) -> Arc<Block> {
        let kp = KeyPair::generate();
        Arc::new(Block::Send(SendBlock::new(
            BlockHash::new([previous; 32]),
            Account::new([destination; 32]),
            Amount::raw(destination as u128),
            &kp.secret,
            0,
        )))
    }

    fn hash_vote(key: &KeyPair, sequence: u64, hashes: Vec<BlockHash>) -> Vote {
        Vote::new(key.public, &key.secret, sequence, VotePayload::Hashes(hashes))
    }

    #[test]
    fn start_creates_one_election_per_root() {
        let active = ActiveElections::new(quorum());
        let block = make_send(1, 2);
        assert_eq!(active.size(), 0);

        assert!(!active.start(block.clone(), 10, 0));
        assert_eq!(active.size(), 1);
        assert_eq!(active.vote_count(&block.qualified_root()), 1);

        // Same root again: joined, not duplicated.
        assert!(active.start(block.clone(), 10, 0));
        assert_eq!(active.size(), 1);
    }

    #[test]
    fn different_roots_get_different_elections() {
        let active = ActiveElections::new(quorum());
        active.start(make_send(1, 2), 0, 0);
        active.start(make_send(2, 3), 0, 0);
        assert_eq!(active.size(), 2);
    }

    #[test]
    fn fork_joins_existing_election() {
        let active = ActiveElections::new(quorum());
        let kp = KeyPair::generate();
        let block1 = Arc::new(Block::Send(SendBlock::new(
            BlockHash::new([1u8; 32]),
            Account::new([2u8; 32]),
            Amount::raw(10),
            &kp.secret,
            0,
        )));
        let block2 = Arc::new(Block::Send(SendBlock::new(
            BlockHash::new([1u8; 32]),
            Account::new([3u8; 32]),
            Amount::raw(20),
            &kp.secret,
            0,
        )));
        assert_eq!(block1.qualified_root(), block2.qualified_root());

        active.start(block1, 0, 0);
        assert!(active.start(block2, 0, 0));
        assert_eq!(active.size(), 1);
    }

    #[test]
    fn vote_routes_to_election() {
        let active = ActiveElections::new(quorum());
        let block = make_send(1, 2);
        active.start(block.clone(), 0, 0);

        let key = KeyPair::generate();
        let vote = hash_vote(&key, 1, vec![block.hash()]);
        assert_eq!(active.vote(&vote, Amount::raw(100), 0), VoteCode::Vote);
        assert_eq!(active.vote_count(&block.qualified_root()), 2);

        // Same sequence again: replay.
        assert_eq!(active.vote(&vote, Amount::raw(100), 1), VoteCode::Replay);
    }

    #[test]
    fn homeless_vote_is_cached_and_replayed() {
        let active = ActiveElections::new(quorum());
        let block = make_send(1, 2);

        let key = KeyPair::generate();
        let vote = hash_vote(&key, 1, vec![block.hash()]);
        active.vote(&vote, Amount::raw(100), 0);
        assert_eq!(active.cached_vote_count(), 1);

        active.start(block.clone(), 0, 1);
        assert_eq!(active.cached_vote_count(), 0);
        // Self-vote plus the replayed cached vote.
        assert_eq!(active.vote_count(&block.qualified_root()), 2);
    }

    #[test]
    fn quorum_confirms_and_reports_losers() {
        let active = ActiveElections::new(quorum());
        let kp = KeyPair::generate();
        let block1 = Arc::new(Block::Send(SendBlock::new(
            BlockHash::new([1u8; 32]),
            Account::new([2u8; 32]),
            Amount::raw(10),
            &kp.secret,
            0,
        )));
        let block2 = Arc::new(Block::Send(SendBlock::new(
            BlockHash::new([1u8; 32]),
            Account::new([3u8; 32]),
            Amount::raw(20),
            &kp.secret,
            0,
        )));
        active.start(block1.clone(), 0, 0);
        active.start(block2.clone(), 0, 0);

        let rep = KeyPair::generate();
        let vote = hash_vote(&rep, 1, vec![block1.hash()]);
        active.vote(&vote, Amount::raw(600), 0);

        let confirmed = active.tally_round(Amount::raw(1000));
        assert_eq!(confirmed.len(), 1);
        let status = &confirmed[0];
        assert_eq!(status.winner.hash(), block1.hash());
        assert_eq!(status.tally, Amount::raw(600));
        assert_eq!(status.losers.len(), 1);
        assert_eq!(status.losers[0].hash(), block2.hash());
        // Confirmed elections leave the active set.
        assert_eq!(active.size(), 0);
    }

    #[test]
    fn below_quorum_stays_active() {
        let active = ActiveElections::new(quorum());
        let block = make_send(1, 2);
        active.start(block.clone(), 0, 0);

        let rep = KeyPair::generate();
        active.vote(
            &hash_vote(&rep, 1, vec![block.hash()]),
            Amount::raw(100),
            0,
        );
        assert!(active.tally_round(Amount::raw(1000)).is_empty());
        assert_eq!(active.size(), 1);
    }

    #[test]
    fn announcements_ordered_by_difficulty() {
        let active = ActiveElections::new(quorum());
        let low = make_send(1, 2);
        let high = make_send(2, 3);
        active.start(low.clone(), 10, 0);
        active.start(high.clone(), 99, 0);

        let announcements = active.announcements(1);
        assert_eq!(announcements.len(), 1);
        assert_eq!(announcements[0].0, high.qualified_root());
    }

    #[test]
    fn election_reaped_after_announcement_cap() {
        let active = ActiveElections::new(quorum());
        let block = make_send(1, 2);
        active.start(block, 0, 0);

        for _ in 0..=ANNOUNCEMENT_MAX {
            active.announcements(10);
        }
        assert_eq!(active.size(), 0);
    }

    #[test]
    fn update_difficulty_reprioritizes() {
        let active = ActiveElections::new(quorum());
        let block = make_send(1, 2);
        active.start(block.clone(), 50, 0);
        let root = block.qualified_root();
        assert_eq!(active.difficulty(&root), Some(50));

        active.update_difficulty(&block.hash(), 80);
        assert_eq!(active.difficulty(&root), Some(80));

        // Lower difficulty never lowers the stored value.
        active.update_difficulty(&block.hash(), 20);
        assert_eq!(active.difficulty(&root), Some(80));
    }
}
