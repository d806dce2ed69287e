//! Structural deduplication of shared votes.
//!
//! Mirrors the block uniquer: identical votes collapse onto one shared
//! instance, and a vote carrying a full block has that block re-uniqued
//! through the block uniquer, so two distinct votes for the same block still
//! share the block allocation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use almond_blocks::BlockUniquer;
use almond_types::BlockHash;

use crate::vote::{Vote, VotePayload};

const CLEANUP_INTERVAL: u64 = 2;
const CLEANUP_WINDOW: usize = 64;

/// Weak-reference registry mapping vote full-hash → shared vote.
pub struct VoteUniquer {
    block_uniquer: Arc<BlockUniquer>,
    votes: Mutex<UniquerInner>,
}

struct UniquerInner {
    entries: HashMap<BlockHash, Weak<Vote>>,
    insertions: u64,
}

impl VoteUniquer {
    pub fn new(block_uniquer: Arc<BlockUniquer>) -> Self {
        Self {
            block_uniquer,
            votes: Mutex::new(UniquerInner {
                entries: HashMap::new(),
                insertions: 0,
            }),
        }
    }

    /// Return the canonical shared instance of this vote, uniquing any block
    /// payload through the block uniquer first.
    pub fn unique(&self, vote: Arc<Vote>) -> Arc<Vote> {
        let vote = match &vote.payload {
            VotePayload::Block(block) => {
                let unique_block = self.block_uniquer.unique(block.clone());
                if Arc::ptr_eq(&unique_block, block) {
                    vote
                } else {
                    Arc::new(Vote {
                        account: vote.account,
                        signature: vote.signature,
                        sequence: vote.sequence,
                        payload: VotePayload::Block(unique_block),
                    })
                }
            }
            VotePayload::Hashes(_) => vote,
        };

        let key = vote.full_hash();
        let mut inner = self.votes.lock().expect("vote uniquer poisoned");

        let result = match inner.entries.get(&key).and_then(Weak::upgrade) {
            Some(existing) => existing,
            None => {
                inner.entries.insert(key, Arc::downgrade(&vote));
                vote
            }
        };

        inner.insertions += 1;
        if inner.insertions % CLEANUP_INTERVAL == 0 {
            inner.cleanup();
        }

        result
    }

    pub fn size(&self) -> usize {
        self.votes.lock().expect("vote uniquer poisoned").entries.len()
    }
}

impl UniquerInner {
    fn cleanup(&mut self) {
        let expired: Vec<BlockHash> = self
            .entries
            .iter()
            .take(CLEANUP_WINDOW)
            .filter(|(_, weak)| weak.strong_count() == 0)
            .map(|(hash, _)| *hash)
            .collect();
        for hash in expired {
            self.entries.remove(&hash);
        }
    }
}
