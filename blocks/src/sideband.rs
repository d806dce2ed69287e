//! Block sideband — auxiliary per-block data stored next to the block
//! itself so chain walks and balance lookups are O(1).

use almond_types::{Account, Amount, BlockHash, Epoch};
use serde::{Deserialize, Serialize};

/// Data the ledger knows at application time but the block doesn't carry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSideband {
    /// The next block on the chain; zero while this block is the head.
    pub successor: BlockHash,
    /// The chain this block belongs to.
    pub account: Account,
    /// 1-based position in the account chain.
    pub height: u64,
    /// Account balance after this block.
    pub balance: Amount,
    /// Seconds since the epoch when the block was applied locally.
    pub timestamp: u64,
    /// Epoch of the account when the block was applied.
    pub epoch: Epoch,
}

impl BlockSideband {
    pub fn new(
        successor: BlockHash,
        account: Account,
        height: u64,
        balance: Amount,
        timestamp: u64,
        epoch: Epoch,
    ) -> Self {
        Self {
            successor,
            account,
            height,
            balance,
            timestamp,
            epoch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bincode_round_trip() {
        let sideband = BlockSideband::new(
            BlockHash::new([1u8; 32]),
            Account::new([2u8; 32]),
            42,
            Amount::raw(1000),
            1_600_000_000,
            Epoch::Epoch0,
        );
        let bytes = bincode::serialize(&sideband).unwrap();
        let decoded: BlockSideband = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, sideband);
    }
}
