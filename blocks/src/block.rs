//! The unified block interface.
//!
//! All five shapes are carried behind one tagged union. The ledger, the
//! processor and the wire protocol only ever speak `Block`.

use almond_types::{Account, Amount, BlockHash, QualifiedRoot, Root, Signature, WorkNonce};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::wire::ByteReader;
use crate::{ChangeBlock, OpenBlock, ReceiveBlock, SendBlock, StateBlock};

/// Wire discriminant for each block shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlockType {
    Invalid = 0,
    NotABlock = 1,
    Send = 2,
    Receive = 3,
    Open = 4,
    Change = 5,
    State = 6,
}

impl BlockType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => BlockType::NotABlock,
            2 => BlockType::Send,
            3 => BlockType::Receive,
            4 => BlockType::Open,
            5 => BlockType::Change,
            6 => BlockType::State,
            _ => BlockType::Invalid,
        }
    }
}

/// Errors from the block wire codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("buffer ended before the structure was complete")]
    Truncated,

    #[error("unknown or invalid block type {0}")]
    InvalidType(u8),
}

/// One block of any shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    Send(SendBlock),
    Receive(ReceiveBlock),
    Open(OpenBlock),
    Change(ChangeBlock),
    State(StateBlock),
}

impl Block {
    pub fn block_type(&self) -> BlockType {
        match self {
            Block::Send(_) => BlockType::Send,
            Block::Receive(_) => BlockType::Receive,
            Block::Open(_) => BlockType::Open,
            Block::Change(_) => BlockType::Change,
            Block::State(_) => BlockType::State,
        }
    }

    /// Canonical Blake2b-256 hash of the block.
    pub fn hash(&self) -> BlockHash {
        match self {
            Block::Send(b) => b.hash(),
            Block::Receive(b) => b.hash(),
            Block::Open(b) => b.hash(),
            Block::Change(b) => b.hash(),
            Block::State(b) => b.hash(),
        }
    }

    /// Predecessor hash; zero for open blocks and first state blocks.
    pub fn previous(&self) -> BlockHash {
        match self {
            Block::Send(b) => b.previous,
            Block::Receive(b) => b.previous,
            Block::Open(_) => BlockHash::ZERO,
            Block::Change(b) => b.previous,
            Block::State(b) => b.previous,
        }
    }

    /// The proof-of-work root: previous hash, or the account for chain-opening
    /// blocks.
    pub fn root(&self) -> Root {
        match self {
            Block::Send(b) => b.previous,
            Block::Receive(b) => b.previous,
            Block::Open(b) => b.account.into(),
            Block::Change(b) => b.previous,
            Block::State(b) => b.root(),
        }
    }

    /// The election conflict key for this block.
    pub fn qualified_root(&self) -> QualifiedRoot {
        QualifiedRoot::new(self.previous(), self.root())
    }

    /// The account that signed the block, when the block itself names it
    /// (open and state blocks). Legacy send/receive/change blocks inherit the
    /// chain owner, which only the ledger knows.
    pub fn account(&self) -> Option<Account> {
        match self {
            Block::Open(b) => Some(b.account),
            Block::State(b) => Some(b.account),
            _ => None,
        }
    }

    /// The referenced source send, for blocks that pocket one.
    pub fn source(&self) -> Option<BlockHash> {
        match self {
            Block::Receive(b) => Some(b.source),
            Block::Open(b) => Some(b.source),
            _ => None,
        }
    }

    /// The resulting balance, for blocks that state one.
    pub fn balance(&self) -> Option<Amount> {
        match self {
            Block::Send(b) => Some(b.balance),
            Block::State(b) => Some(b.balance),
            _ => None,
        }
    }

    /// The named representative, for blocks that carry one.
    pub fn representative(&self) -> Option<Account> {
        match self {
            Block::Open(b) => Some(b.representative),
            Block::Change(b) => Some(b.representative),
            Block::State(b) => Some(b.representative),
            _ => None,
        }
    }

    pub fn work(&self) -> WorkNonce {
        match self {
            Block::Send(b) => b.work,
            Block::Receive(b) => b.work,
            Block::Open(b) => b.work,
            Block::Change(b) => b.work,
            Block::State(b) => b.work,
        }
    }

    pub fn set_work(&mut self, work: WorkNonce) {
        match self {
            Block::Send(b) => b.work = work,
            Block::Receive(b) => b.work = work,
            Block::Open(b) => b.work = work,
            Block::Change(b) => b.work = work,
            Block::State(b) => b.work = work,
        }
    }

    pub fn signature(&self) -> &Signature {
        match self {
            Block::Send(b) => &b.signature,
            Block::Receive(b) => &b.signature,
            Block::Open(b) => &b.signature,
            Block::Change(b) => &b.signature,
            Block::State(b) => &b.signature,
        }
    }

    pub fn set_signature(&mut self, signature: Signature) {
        match self {
            Block::Send(b) => b.signature = signature,
            Block::Receive(b) => b.signature = signature,
            Block::Open(b) => b.signature = signature,
            Block::Change(b) => b.signature = signature,
            Block::State(b) => b.signature = signature,
        }
    }

    /// Serialized size of a block body of the given type.
    pub fn serialized_size(block_type: BlockType) -> usize {
        match block_type {
            BlockType::Send => SendBlock::SERIALIZED_SIZE,
            BlockType::Receive => ReceiveBlock::SERIALIZED_SIZE,
            BlockType::Open => OpenBlock::SERIALIZED_SIZE,
            BlockType::Change => ChangeBlock::SERIALIZED_SIZE,
            BlockType::State => StateBlock::SERIALIZED_SIZE,
            BlockType::Invalid | BlockType::NotABlock => 0,
        }
    }

    /// Canonical wire encoding of the block body (no type tag).
    pub fn serialize(&self, buffer: &mut Vec<u8>) {
        match self {
            Block::Send(b) => b.serialize(buffer),
            Block::Receive(b) => b.serialize(buffer),
            Block::Open(b) => b.serialize(buffer),
            Block::Change(b) => b.serialize(buffer),
            Block::State(b) => b.serialize(buffer),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(Self::serialized_size(self.block_type()));
        self.serialize(&mut buffer);
        buffer
    }

    /// Decode a block body of a known type.
    pub fn deserialize(block_type: BlockType, reader: &mut ByteReader<'_>) -> Result<Self, BlockError> {
        match block_type {
            BlockType::Send => Ok(Block::Send(SendBlock::deserialize(reader)?)),
            BlockType::Receive => Ok(Block::Receive(ReceiveBlock::deserialize(reader)?)),
            BlockType::Open => Ok(Block::Open(OpenBlock::deserialize(reader)?)),
            BlockType::Change => Ok(Block::Change(ChangeBlock::deserialize(reader)?)),
            BlockType::State => Ok(Block::State(StateBlock::deserialize(reader)?)),
            other => Err(BlockError::InvalidType(other as u8)),
        }
    }
}
