//! Unified state block.
//!
//! A state block records the complete resulting state of an account: its
//! balance, representative and a link whose meaning follows from the balance
//! delta. One shape replaces all four legacy variants.

use almond_types::{Account, Amount, BlockHash, Link, RawKey, Signature, WorkNonce};
use serde::{Deserialize, Serialize};

use crate::wire::ByteReader;
use crate::BlockError;

/// Domain-separation preamble mixed into every state block hash so a state
/// block can never collide with a legacy block over the same fields.
const STATE_PREAMBLE: [u8; 32] = {
    let mut bytes = [0u8; 32];
    bytes[31] = 6; // BlockType::State discriminant
    bytes
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBlock {
    pub account: Account,
    pub previous: BlockHash,
    pub representative: Account,
    pub balance: Amount,
    pub link: Link,
    pub signature: Signature,
    pub work: WorkNonce,
}

impl StateBlock {
    pub const SERIALIZED_SIZE: usize = 32 + 32 + 32 + 16 + 32 + 64 + 8;

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account: Account,
        previous: BlockHash,
        representative: Account,
        balance: Amount,
        link: Link,
        secret: &RawKey,
        work: WorkNonce,
    ) -> Self {
        let mut block = Self {
            account,
            previous,
            representative,
            balance,
            link,
            signature: Signature::ZERO,
            work,
        };
        block.signature = almond_crypto::sign_message(secret, block.hash().as_bytes());
        block
    }

    pub fn hash(&self) -> BlockHash {
        BlockHash::new(almond_crypto::blake2b_256_multi(&[
            &STATE_PREAMBLE,
            self.account.as_bytes(),
            self.previous.as_bytes(),
            self.representative.as_bytes(),
            &self.balance.to_be_bytes(),
            self.link.as_bytes(),
        ]))
    }

    /// The root of a state block: its previous hash, or the account for the
    /// first block on the chain.
    pub fn root(&self) -> BlockHash {
        if self.previous.is_zero() {
            self.account.into()
        } else {
            self.previous
        }
    }

    pub fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(self.account.as_bytes());
        buffer.extend_from_slice(self.previous.as_bytes());
        buffer.extend_from_slice(self.representative.as_bytes());
        buffer.extend_from_slice(&self.balance.to_be_bytes());
        buffer.extend_from_slice(self.link.as_bytes());
        buffer.extend_from_slice(self.signature.as_bytes());
        buffer.extend_from_slice(&self.work.to_le_bytes());
    }

    pub fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, BlockError> {
        Ok(Self {
            account: reader.read_account()?,
            previous: reader.read_hash()?,
            representative: reader.read_account()?,
            balance: reader.read_amount_be()?,
            link: reader.read_hash()?,
            signature: reader.read_signature()?,
            work: reader.read_u64_le()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use almond_crypto::KeyPair;

    fn sample(kp: &KeyPair) -> StateBlock {
        StateBlock::new(
            kp.public,
            BlockHash::new([1u8; 32]),
            Account::new([2u8; 32]),
            Amount::raw(500),
            BlockHash::new([3u8; 32]),
            &kp.secret,
            11,
        )
    }

    #[test]
    fn serialize_round_trip() {
        let kp = KeyPair::generate();
        let block = sample(&kp);
        let mut bytes = Vec::new();
        block.serialize(&mut bytes);
        assert_eq!(bytes.len(), StateBlock::SERIALIZED_SIZE);
        let decoded = StateBlock::deserialize(&mut ByteReader::new(&bytes)).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn root_is_account_for_first_block() {
        let kp = KeyPair::generate();
        let mut block = sample(&kp);
        block.previous = BlockHash::ZERO;
        assert_eq!(block.root(), kp.public.into());
    }

    #[test]
    fn root_is_previous_otherwise() {
        let kp = KeyPair::generate();
        let block = sample(&kp);
        assert_eq!(block.root(), block.previous);
    }

    #[test]
    fn preamble_separates_state_hashes_from_legacy() {
        // A state block over all-zero fields must not hash like an empty
        // legacy block; the preamble guarantees domain separation.
        let zeroed = StateBlock {
            account: Account::ZERO,
            previous: BlockHash::ZERO,
            representative: Account::ZERO,
            balance: Amount::ZERO,
            link: BlockHash::ZERO,
            signature: Signature::ZERO,
            work: 0,
        };
        assert!(!zeroed.hash().is_zero());
    }
}
