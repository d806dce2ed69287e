//! Legacy receive block.

use almond_types::{BlockHash, RawKey, Signature, WorkNonce};
use serde::{Deserialize, Serialize};

use crate::wire::ByteReader;
use crate::BlockError;

/// Pockets a pending send. The source field names the send block being
/// received; the credited amount is the send's amount, looked up from the
/// pending table at application time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveBlock {
    pub previous: BlockHash,
    pub source: BlockHash,
    pub signature: Signature,
    pub work: WorkNonce,
}

impl ReceiveBlock {
    pub const SERIALIZED_SIZE: usize = 32 + 32 + 64 + 8;

    pub fn new(previous: BlockHash, source: BlockHash, secret: &RawKey, work: WorkNonce) -> Self {
        let mut block = Self {
            previous,
            source,
            signature: Signature::ZERO,
            work,
        };
        block.signature = almond_crypto::sign_message(secret, block.hash().as_bytes());
        block
    }

    pub fn hash(&self) -> BlockHash {
        BlockHash::new(almond_crypto::blake2b_256_multi(&[
            self.previous.as_bytes(),
            self.source.as_bytes(),
        ]))
    }

    pub fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(self.previous.as_bytes());
        buffer.extend_from_slice(self.source.as_bytes());
        buffer.extend_from_slice(self.signature.as_bytes());
        buffer.extend_from_slice(&self.work.to_le_bytes());
    }

    pub fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, BlockError> {
        Ok(Self {
            previous: reader.read_hash()?,
            source: reader.read_hash()?,
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
        let block = ReceiveBlock::new(
            BlockHash::new([1u8; 32]),
            BlockHash::new([2u8; 32]),
            &kp.secret,
            5,
        );
        let mut bytes = Vec::new();
        block.serialize(&mut bytes);
        assert_eq!(bytes.len(), ReceiveBlock::SERIALIZED_SIZE);
        let decoded = ReceiveBlock::deserialize(&mut ByteReader::new(&bytes)).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn hash_depends_on_source() {
        let a = ReceiveBlock {
            previous: BlockHash::new([1u8; 32]),
            source: BlockHash::new([2u8; 32]),
            signature: Signature::ZERO,
            work: 0,
        };
        let mut b = a.clone();
        b.source = BlockHash::new([3u8; 32]);
        assert_ne!(a.hash(), b.hash());
    }
}
