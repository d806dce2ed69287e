//! Root and link types.
//!
//! The root of a block is its previous hash, or the account itself for the
//! first block on a chain. Elections are keyed by the qualified root: the
//! 512-bit concatenation of a block's previous hash and its root, which
//! uniquely identifies the position being contested.

use crate::BlockHash;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A block root: either a previous block hash or an account, depending on
/// chain position. Both are 256-bit values, so a single alias suffices.
pub type Root = BlockHash;

/// The link field of a state block. Interpreted by context: destination
/// account for sends, source block hash for receives, epoch marker for epoch
/// blocks, zero for representative changes.
pub type Link = BlockHash;

/// The 512-bit conflict key for elections: `(previous, root)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedRoot {
    pub previous: BlockHash,
    pub root: Root,
}

impl QualifiedRoot {
    pub fn new(previous: BlockHash, root: Root) -> Self {
        Self { previous, root }
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(self.previous.as_bytes());
        bytes[32..].copy_from_slice(self.root.as_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        let mut previous = [0u8; 32];
        let mut root = [0u8; 32];
        previous.copy_from_slice(&bytes[..32]);
        root.copy_from_slice(&bytes[32..]);
        Self {
            previous: BlockHash::new(previous),
            root: BlockHash::new(root),
        }
    }
}

impl fmt::Debug for QualifiedRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QualifiedRoot({:?}, {:?})", self.previous, self.root)
    }
}
