//! Ed25519 message signing and verification.

use almond_types::{Account, RawKey, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rayon::prelude::*;

/// Sign a message with a secret key.
pub fn sign_message(secret: &RawKey, message: &[u8]) -> Signature {
    let signing = SigningKey::from_bytes(secret.as_bytes());
    Signature(signing.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
pub fn validate_message(account: &Account, message: &[u8], signature: &Signature) -> bool {
    let Ok(verifying) = VerifyingKey::from_bytes(account.as_bytes()) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    verifying.verify(message, &sig).is_ok()
}

/// Verify a batch of signatures, returning a per-item validity flag.
///
/// The batch path is what makes state-block ingestion cheap: one call per
/// processor batch instead of one per block. Items are verified in parallel;
/// each entry of the result is `true` iff that (message, signature, account)
/// triple is valid.
pub fn validate_message_batch(
    messages: &[&[u8]],
    accounts: &[Account],
    signatures: &[Signature],
) -> Vec<bool> {
    debug_assert_eq!(messages.len(), accounts.len());
    debug_assert_eq!(messages.len(), signatures.len());

    messages
        .par_iter()
        .zip(accounts.par_iter())
        .zip(signatures.par_iter())
        .map(|((message, account), signature)| validate_message(account, message, signature))
        .collect()
}
