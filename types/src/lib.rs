//! Fundamental types for the almond protocol.
//!
//! This crate defines the core value types shared across every other crate in
//! the workspace: accounts, hashes, amounts, signatures, roots, epochs and
//! the per-network protocol constants.

pub mod account;
pub mod amount;
pub mod epoch;
pub mod error;
pub mod hash;
pub mod keys;
pub mod network;
pub mod root;

pub use account::Account;
pub use amount::Amount;
pub use epoch::Epoch;
pub use error::TypeError;
pub use hash::BlockHash;
pub use keys::{RawKey, Signature};
pub use network::{
    Networks, NODE_ID_VERSION, PROTOCOL_VERSION, PROTOCOL_VERSION_MIN,
};
pub use root::{Link, QualifiedRoot, Root};

/// A 64-bit proof-of-work nonce embedded in every block.
pub type WorkNonce = u64;
