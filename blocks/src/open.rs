//! Legacy open block — the first block on an account chain.

use almond_types::{Account, BlockHash, RawKey, Signature, WorkNonce};
use serde::{Deserialize, Serialize};

use crate::wire::ByteReader;
use crate::BlockError;

/// Opens an account by receiving its first send. Open blocks have no
/// previous; their root is the account itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenBlock {
    pub source: BlockHash,
    pub representative: Account,
    pub account: Account,
    pub signature: Signature,
    pub work: WorkNonce,
}

impl OpenBlock {
    pub const SERIALIZED_SIZE: usize = 32 + 32 + 32 + 64 + 8;

    pub fn new(
        source: BlockHash,
        representative: Account,
        account: Account,
        secret: &RawKey,
        work: WorkNonce,
    ) -> Self {
        let mut block = Self {
            source,
            representative,
            account,
            signature: Signature::ZERO,
            work,
        };
        block.signature = almond_crypto::sign_message(secret, block.hash().as_bytes());
        block
    }

    pub fn hash(&self) -> BlockHash {
        BlockHash::new(almond_crypto::blake2b_256_multi(&[
            self.source.as_bytes(),
            self.representative.as_bytes(),
            self.account.as_bytes(),
        ]))
    }

    pub fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(self.source.as_bytes());
        buffer.extend_from_slice(self.representative.as_bytes());
        buffer.extend_from_slice(self.account.as_bytes());
        buffer.extend_from_slice(self.signature.as_bytes());
        buffer.extend_from_slice(&self.work.to_le_bytes());
    }

    pub fn deserialize(reader: &mut ByteReader<'_>) -> Result<Self, BlockError> {
        Ok(Self {
            source: reader.read_hash()?,
            representative: reader.read_account()?,
            account: reader.read_account()?,
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
        let block = OpenBlock::new(
            BlockHash::new([1u8; 32]),
            Account::new([2u8; 32]),
            kp.public,
            &kp.secret,
            9,
        );
        let mut bytes = Vec::new();
        block.serialize(&mut bytes);
        assert_eq!(bytes.len(), OpenBlock::SERIALIZED_SIZE);
        let decoded = OpenBlock::deserialize(&mut ByteReader::new(&bytes)).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn signature_verifies_against_opened_account() {
        let kp = KeyPair::generate();
        let block = OpenBlock::new(
            BlockHash::new([1u8; 32]),
            Account::new([2u8; 32]),
            kp.public,
            &kp.secret,
            0,
        );
        assert!(almond_crypto::validate_message(
            &kp.public,
            block.hash().as_bytes(),
            &block.signature
        ));
    }
}
