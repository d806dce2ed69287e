//! Votes.
//!
//! A vote is a representative's signed statement about one block or up to
//! twelve block hashes, with a per-voter sequence number. The signature
//! covers a domain-separation prefix, the hashes and the sequence, so a
//! vote for hashes can never be confused with any other signed structure.

use std::sync::Arc;

use almond_blocks::wire::ByteReader;
use almond_blocks::{Block, BlockError, BlockType};
use almond_crypto::blake2b_256_multi;
use almond_types::{Account, BlockHash, RawKey, Signature};

/// Domain-separation prefix mixed into every vote hash.
const VOTE_HASH_PREFIX: &[u8] = b"vote ";

/// A vote may carry at most this many hashes.
pub const MAX_VOTE_HASHES: usize = 12;

/// Outcome of ingesting a vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteCode {
    /// Highest sequence seen from this voter; counted.
    Vote,
    /// Not the highest sequence from this voter; a replay.
    Replay,
    /// Signature or structure invalid.
    Invalid,
}

/// The blocks a vote endorses: one full block, or a list of hashes.
#[derive(Clone, Debug)]
pub enum VotePayload {
    Block(Arc<Block>),
    Hashes(Vec<BlockHash>),
}

#[derive(Clone, Debug)]
pub struct Vote {
    /// The representative casting the vote.
    pub account: Account,
    /// Signature over the vote hash.
    pub signature: Signature,
    /// Vote round sequence number, strictly increasing per voter.
    pub sequence: u64,
    pub payload: VotePayload,
}

impl Vote {
    pub fn new(
        account: Account,
        secret: &RawKey,
        sequence: u64,
        payload: VotePayload,
    ) -> Self {
        let mut vote = Self {
            account,
            signature: Signature::ZERO,
            sequence,
            payload,
        };
        vote.signature = almond_crypto::sign_message(secret, vote.hash().as_bytes());
        vote
    }

    /// Every block hash this vote endorses.
    pub fn hashes(&self) -> Vec<BlockHash> {
        match &self.payload {
            VotePayload::Block(block) => vec![block.hash()],
            VotePayload::Hashes(hashes) => hashes.clone(),
        }
    }

    /// The signed digest: prefix ‖ hashes ‖ sequence.
    pub fn hash(&self) -> BlockHash {
        let hashes = self.hashes();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(hashes.len() + 2);
        parts.push(VOTE_HASH_PREFIX);
        for hash in &hashes {
            parts.push(hash.as_bytes());
        }
        let sequence_bytes = self.sequence.to_le_bytes();
        parts.push(&sequence_bytes);
        BlockHash::new(blake2b_256_multi(&parts))
    }

    /// Identity hash covering voter and signature too; the uniquer key.
    pub fn full_hash(&self) -> BlockHash {
        BlockHash::new(blake2b_256_multi(&[
            self.hash().as_bytes(),
            self.account.as_bytes(),
            self.signature.as_bytes(),
        ]))
    }

    /// Verify structure and signature.
    pub fn validate(&self) -> bool {
        match &self.payload {
            VotePayload::Hashes(hashes) if hashes.is_empty() || hashes.len() > MAX_VOTE_HASHES => {
                return false
            }
            _ => {}
        }
        almond_crypto::validate_message(&self.account, self.hash().as_bytes(), &self.signature)
    }

    /// The block type tag the wire header must carry for this payload.
    pub fn wire_block_type(&self) -> BlockType {
        match &self.payload {
            VotePayload::Block(block) => block.block_type(),
            VotePayload::Hashes(_) => BlockType::NotABlock,
        }
    }

    /// Wire encoding: account ‖ signature ‖ sequence ‖ payload.
    pub fn serialize(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(self.account.as_bytes());
        buffer.extend_from_slice(self.signature.as_bytes());
        buffer.extend_from_slice(&self.sequence.to_le_bytes());
        match &self.payload {
            VotePayload::Block(block) => block.serialize(buffer),
            VotePayload::Hashes(hashes) => {
                buffer.push(hashes.len() as u8);
                for hash in hashes {
                    buffer.extend_from_slice(hash.as_bytes());
                }
            }
        }
    }

    /// Decode a vote whose payload kind is `block_type`
    /// ([`BlockType::NotABlock`] means a hash list).
    pub fn deserialize(
        block_type: BlockType,
        reader: &mut ByteReader<'_>,
    ) -> Result<Self, BlockError> {
        let account = reader.read_account()?;
        let signature = reader.read_signature()?;
        let sequence = reader.read_u64_le()?;
        let payload = if block_type == BlockType::NotABlock {
            let count = reader.read_u8()? as usize;
            if count == 0 || count > MAX_VOTE_HASHES {
                return Err(BlockError::InvalidType(block_type as u8));
            }
            let mut hashes = Vec::with_capacity(count);
            for _ in 0..count {
                hashes.push(reader.read_hash()?);
            }
            VotePayload::Hashes(hashes)
        } else {
            VotePayload::Block(Arc::new(Block::deserialize(block_type, reader)?))
        };
        Ok(Self {
            account,
            signature,
            sequence,
            payload,
        })
    }
}
