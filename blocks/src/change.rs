//! Legacy representative-change block.

use almond_types::{Account, BlockHash, RawKey, Signature, WorkNonce};
use serde::{Deserialize, Serialize};

use crate::wire::ByteReader;
use crate::BlockError;

/// Re-delegates the account's voting weight to a new representative.
/// Transfers no funds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBlock {
    pub previous: BlockHash,
    pub representative: Account,
    pub signature: Signature,
    pub work: WorkNonce,
}

impl ChangeBlock {
    pub const SERIALIZED_SIZE: usize = 32 + 32 + 64 + 8;

    pub fn new(
        previous: BlockHash,
        representative: Account,
        secret: &RawKey,
        work: WorkNonce,
    ) -> Self {
        let mut block = Self {
            previous,
            representative,
            signature: Signature::ZERO,
            work,
        };
        block.signature = almond_crypto::sign_message(secret, block.hash().as_bytes());
        block
    }

    pub fn hash(&self) -> BlockHash {
        BlockHash::new(almond_crypto::blake2b_256_multi(&[
            self.previous.as_bytes(),
            self.representative.as_bytes(),
        ]))
    }

    pub fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(self.previous.as_bytes());
        buffer.extend_from_slice(self.representative.as_bytes());
        buffer.extend_from_slice(self.signature.as_bytes());
        buffer.extend_from_slice(&self.work.to_le_bytes());
    }

    pub fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, BlockError> {
        Ok(Self {
            previous: reader.read_hash()?,
            representative: reader.read_account()?,
            signature: reader.read_signature()?,
            work: reader.read_u64_le()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use almond_crypto::KeyPair;

    #[test]
    fn serialize_round_trip() {
        let kp = KeyPair::generate();
        let block = ChangeBlock::new(
            BlockHash::new([1u8; 32]),
            Account::new([2u8; 32]),
            &kp.secret,
            3,
        );
        let mut bytes = Vec::new();
        block.serialize(&mut bytes);
        assert_eq!(bytes.len(), ChangeBlock::SERIALIZED_SIZE);
        let decoded = ChangeBlock::deserialize(&mut ByteReader::new(&bytes)).unwrap();
        assert_eq!(decoded, block);
    }
}
