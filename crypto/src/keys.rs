//! Ed25519 key generation and derivation.

use almond_types::{Account, RawKey};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::blake2b_256_multi;

/// A key pair. The secret is generated from the system random source, passed
/// in directly, or derived deterministically from a wallet seed.
pub struct KeyPair {
    pub public: Account,
    pub secret: RawKey,
}

impl KeyPair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        keypair_from_raw(RawKey::new(seed))
    }

    /// Reconstruct a key pair from a secret key.
    pub fn from_raw(secret: RawKey) -> Self {
        keypair_from_raw(secret)
    }
}

/// Generate a new random key pair.
pub fn generate_keypair() -> KeyPair {
    KeyPair::generate()
}

/// Derive the public key from a secret key.
pub fn pub_key(secret: &RawKey) -> Account {
    let signing = SigningKey::from_bytes(secret.as_bytes());
    Account::new(signing.verifying_key().to_bytes())
}

/// Reconstruct a full key pair from a secret key.
pub fn keypair_from_raw(secret: RawKey) -> KeyPair {
    let public = pub_key(&secret);
    KeyPair { public, secret }
}

/// Deterministic key derivation: `blake2b256(seed ‖ index_be)`.
///
/// Wallet collaborators derive account keys from a single seed so a backup
/// of the seed recovers every account.
pub fn deterministic_key(seed: &RawKey, index: u32) -> RawKey {
    RawKey::new(blake2b_256_multi(&[
        seed.as_bytes().as_slice(),
        &index.to_be_bytes(),
    ]))
}
