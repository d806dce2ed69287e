//! Structural deduplication of shared block instances.
//!
//! Blocks arrive repeatedly from many peers. The uniquer maps each hash to a
//! weak reference so that structurally identical copies collapse onto one
//! shared allocation, without keeping dead blocks alive.

use almond_types::BlockHash;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::Block;

/// Every Nth insertion triggers a cleanup scan.
const CLEANUP_INTERVAL: u64 = 2;
/// Upper bound on entries examined per cleanup scan.
const CLEANUP_WINDOW: usize = 64;

/// Weak-reference registry mapping block hash → shared block.
pub struct BlockUniquer {
    blocks: Mutex<UniquerInner>,
}

struct UniquerInner {
    entries: HashMap<BlockHash, Weak<Block>>,
    insertions: u64,
}

impl BlockUniquer {
    pub fn new() -> Self {
        Self {
            blocks: Mutex::new(UniquerInner {
                entries: HashMap::new(),
                insertions: 0,
            }),
        }
    }

    /// Return the canonical shared instance for this block's hash.
    ///
    /// If an identical block is already live, the existing instance is
    /// returned and the argument dropped; otherwise the argument becomes the
    /// canonical instance.
    pub fn unique(&self, block: Arc<Block>) -> Arc<Block> {
        let hash = block.hash();
        let mut inner = self.blocks.lock().expect("block uniquer poisoned");

        let result = match inner.entries.get(&hash).and_then(Weak::upgrade) {
            Some(existing) => existing,
            None => {
                inner.entries.insert(hash, Arc::downgrade(&block));
                block
            }
        };

        inner.insertions += 1;
        if inner.insertions % CLEANUP_INTERVAL == 0 {
            inner.cleanup();
        }

        result
    }

    /// Number of live entries (expired weak references may still be counted
    /// until a cleanup scan reaches them).
    pub fn size(&self) -> usize {
        self.blocks.lock().expect("block uniquer poisoned").entries.len()
    }
}

impl UniquerInner {
    /// Drop up to [`CLEANUP_WINDOW`] entries whose blocks have been freed.
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

impl Default for BlockUniquer {
    fn default() -> Self {
        Self::new()
    }
}
