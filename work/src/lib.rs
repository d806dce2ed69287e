//! Proof-of-work for the almond protocol.
//!
//! A block's work nonce is valid when `blake2b(nonce_le ‖ root)`, read as a
//! little-endian 64-bit integer, meets the network publish threshold. The
//! pool searches nonces on a set of worker threads with per-root
//! cancellation and an optional GPU backend.

pub mod pool;
pub mod validate;

pub use pool::{GpuWorkFn, WorkPool};
pub use validate::{work_validate, work_validate_block, work_value};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkError {
    #[error("work value {observed:#018x} is below the required threshold {threshold:#018x}")]
    InsufficientDifficulty { observed: u64, threshold: u64 },

    #[error("work generation was cancelled")]
    Cancelled,
}
