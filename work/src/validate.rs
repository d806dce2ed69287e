//! Work validation.

use almond_blocks::Block;
use almond_crypto::blake2b_256_multi;
use almond_types::Root;

use crate::WorkError;

/// The difficulty a nonce achieves for a root:
/// `LE-u64(blake2b(nonce_le ‖ root))`.
pub fn work_value(root: &Root, work: u64) -> u64 {
    let hash = blake2b_256_multi(&[&work.to_le_bytes(), root.as_bytes()]);
    u64::from_le_bytes(hash[0..8].try_into().expect("8 bytes"))
}

/// Validate a nonce against a threshold, reporting the observed difficulty.
pub fn work_validate(root: &Root, work: u64, threshold: u64) -> Result<u64, WorkError> {
    let observed = work_value(root, work);
    if observed >= threshold {
        Ok(observed)
    } else {
        Err(WorkError::InsufficientDifficulty {
            observed,
            threshold,
        })
    }
}

/// Validate the embedded nonce of a block against a threshold.
pub fn work_validate_block(block: &Block, threshold: u64) -> Result<u64, WorkError> {
    work_validate(&block.root(), block.work(), threshold)
}
