//! Legacy send block.

use almond_types::{Account, Amount, BlockHash, RawKey, Signature, WorkNonce};
use serde::{Deserialize, Serialize};

use crate::wire::ByteReader;
use crate::BlockError;

/// Sends funds to a destination account. The balance field is the sender's
/// balance *after* the send; the transferred amount is the difference from
/// the previous balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBlock {
    pub previous: BlockHash,
    pub destination: Account,
    pub balance: Amount,
    pub signature: Signature,
    pub work: WorkNonce,
}

impl SendBlock {
    pub const SERIALIZED_SIZE: usize = 32 + 32 + 16 + 64 + 8;

    /// Build and sign a send block.
    pub fn new(
        previous: BlockHash,
        destination: Account,
        balance: Amount,
        secret: &RawKey,
        work: WorkNonce,
    ) -> Self {
        let mut block = Self {
            previous,
            destination,
            balance,
            signature: Signature::ZERO,
            work,
        };
        block.signature = almond_crypto::sign_message(secret, block.hash().as_bytes());
        block
    }

    /// Canonical Blake2b-256 hash over the hashable fields.
    pub fn hash(&self) -> BlockHash {
        BlockHash::new(almond_crypto::blake2b_256_multi(&[
            self.previous.as_bytes(),
            self.destination.as_bytes(),
            &self.balance.to_be_bytes(),
        ]))
    }

    pub fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(self.previous.as_bytes());
        buffer.extend_from_slice(self.destination.as_bytes());
        buffer.extend_from_slice(&self.balance.to_be_bytes());
        buffer.extend_from_slice(self.signature.as_bytes());
        buffer.extend_from_slice(&self.work.to_le_bytes());
    }

    pub fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, BlockError> {
        Ok(Self {
            previous: reader.read_hash()?,
            destination: reader.read_account()?,
            balance: reader.read_amount_be()?,
            signature: reader.read_signature()?,
            work: reader.read_u64_le()?,
        })
    }
}
