//! Cryptographic primitives for the almond protocol.
//!
//! - **Ed25519** for block and vote signatures, including batch verification
//! - **Blake2b-256** for block, vote and work hashing
//! - Deterministic key derivation for wallet collaborators
//! - Account address codec with the `alm_` prefix

pub mod address;
pub mod hash;
pub mod keys;
pub mod sign;

pub use address::{decode_account, encode_account, validate_address};
pub use hash::{blake2b_256, blake2b_256_multi};
pub use keys::{deterministic_key, generate_keypair, keypair_from_raw, pub_key, KeyPair};
pub use sign::{sign_message, validate_message, validate_message_batch};
