//! Vote cache — holds votes that arrive before their election exists.
//!
//! Votes travel independently of blocks, so a representative's vote can
//! land before the node has seen the conflict. Cached votes are replayed
//! into the election when it starts.

use std::collections::HashMap;

use almond_types::{Account, Amount, BlockHash};

/// Hard cap on tracked hashes.
const MAX_CACHE_SIZE: usize = 65_536;
/// Per-hash voter cap; the lightest voter is evicted first.
const MAX_VOTERS_PER_HASH: usize = 64;

/// One cached vote for one hash.
#[derive(Clone, Debug)]
pub struct CachedVote {
    pub voter: Account,
    pub sequence: u64,
    pub weight: Amount,
}

/// Pre-election vote storage with per-voter deduplication.
pub struct VoteCache {
    entries: HashMap<BlockHash, Vec<CachedVote>>,
}

impl VoteCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Cache a vote for a hash. A voter's later sequence replaces their
    /// earlier one; when the per-hash cap is hit, the lightest voter makes
    /// room for heavier ones.
    pub fn insert(&mut self, hash: BlockHash, voter: Account, sequence: u64, weight: Amount) {
        if self.entries.len() >= MAX_CACHE_SIZE && !self.entries.contains_key(&hash) {
            return;
        }
        let votes = self.entries.entry(hash).or_default();

        if let Some(existing) = votes.iter_mut().find(|v| v.voter == voter) {
            if sequence > existing.sequence {
                existing.sequence = sequence;
                existing.weight = weight;
            }
            return;
        }

        if votes.len() >= MAX_VOTERS_PER_HASH {
            let Some((lightest_index, lightest)) = votes
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.weight)
                .map(|(i, v)| (i, v.weight))
            else {
                return;
            };
            if weight <= lightest {
                return;
            }
            votes.remove(lightest_index);
        }

        votes.push(CachedVote {
            voter,
            sequence,
            weight,
        });
    }

    /// Drain every cached vote for `hash`.
    pub fn take(&mut self, hash: &BlockHash) -> Vec<CachedVote> {
        self.entries.remove(hash).unwrap_or_default()
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for VoteCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter(byte: u8) -> Account {
        Account::new([byte; 32])
    }

    #[test]
    fn insert_and_take() {
        let mut cache = VoteCache::new();
        let hash = BlockHash::new([1u8; 32]);
        cache.insert(hash, voter(1), 1, Amount::raw(100));
        cache.insert(hash, voter(2), 1, Amount::raw(200));
        assert!(cache.contains(&hash));

        let votes = cache.take(&hash);
        assert_eq!(votes.len(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn later_sequence_replaces() {
        let mut cache = VoteCache::new();
        let hash = BlockHash::new([1u8; 32]);
        cache.insert(hash, voter(1), 1, Amount::raw(100));
        cache.insert(hash, voter(1), 3, Amount::raw(150));
        cache.insert(hash, voter(1), 2, Amount::raw(999));

        let votes = cache.take(&hash);
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].sequence, 3);
        assert_eq!(votes[0].weight, Amount::raw(150));
    }

    #[test]
    fn lightest_voter_evicted_at_cap() {
        let mut cache = VoteCache::new();
        let hash = BlockHash::new([1u8; 32]);
        for index in 0..MAX_VOTERS_PER_HASH {
            cache.insert(hash, voter(index as u8), 1, Amount::raw(10 + index as u128));
        }
        // Too light: dropped.
        cache.insert(hash, voter(200), 1, Amount::raw(1));
        // Heavy: evicts the lightest.
        cache.insert(hash, voter(201), 1, Amount::raw(1_000_000));

        let votes = cache.take(&hash);
        assert_eq!(votes.len(), MAX_VOTERS_PER_HASH);
        assert!(votes.iter().any(|v| v.voter == voter(201)));
        assert!(!votes.iter().any(|v| v.voter == voter(200)));
        assert!(!votes.iter().any(|v| v.voter == voter(0)));
    }

    #[test]
    fn take_unknown_hash_is_empty() {
        let mut cache = VoteCache::new();
        assert!(cache.take(&BlockHash::new([9u8; 32])).is_empty());
    }
}
