//! Node-to-node messages.
//!
//! Every message is an 8-byte header followed by a fixed-layout body.
//! Deserialization is total: any malformed input comes back as a typed
//! [`MessageError`], never a panic.

pub mod header;

pub use header::{MessageHeader, MessageType, HEADER_SIZE, MAGIC};

use std::net::{Ipv6Addr, SocketAddrV6};
use std::sync::Arc;

use almond_blocks::wire::ByteReader;
use almond_blocks::{Block, BlockError, BlockType};
use almond_consensus::Vote;
use almond_types::{Account, BlockHash, Root, Signature};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("bad magic {0:02x?}")]
    BadMagic([u8; 2]),

    #[error("unknown message type {0:#04x}")]
    UnknownType(u8),

    #[error("message body malformed: {0}")]
    Block(#[from] BlockError),

    #[error("message carries an invalid block type")]
    InvalidBlockType,
}

/// The all-zero endpoint sentinel used to pad keepalive slots.
pub fn null_endpoint() -> SocketAddrV6 {
    SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0)
}

fn serialize_endpoint(buffer: &mut Vec<u8>, endpoint: &SocketAddrV6) {
    buffer.extend_from_slice(&endpoint.ip().octets());
    buffer.extend_from_slice(&endpoint.port().to_le_bytes());
}

fn deserialize_endpoint(reader: &mut ByteReader<'_>) -> Result<SocketAddrV6, MessageError> {
    let octets: [u8; 16] = reader.take(16)?.try_into().expect("16 bytes");
    let port = reader.read_u16_le()?;
    Ok(SocketAddrV6::new(octets.into(), port, 0, 0))
}

/// Keepalive: eight peer endpoints, padded with the null endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keepalive {
    pub peers: [SocketAddrV6; 8],
}

impl Default for Keepalive {
    fn default() -> Self {
        Self {
            peers: [null_endpoint(); 8],
        }
    }
}

/// Publish: one block, fire-and-forget.
#[derive(Clone, Debug)]
pub struct Publish {
    pub block: Arc<Block>,
}

/// Confirm-req payload: the contested block itself, or a batch of
/// (root, hash) pairs for state requests.
#[derive(Clone, Debug)]
pub enum ConfirmReqPayload {
    Block(Arc<Block>),
    Roots(Vec<(Root, BlockHash)>),
}

#[derive(Clone, Debug)]
pub struct ConfirmReq {
    pub payload: ConfirmReqPayload,
}

/// Confirm-ack: a vote.
#[derive(Clone, Debug)]
pub struct ConfirmAck {
    pub vote: Arc<Vote>,
}

/// Frontier request: walk accounts from `start`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrontierReq {
    pub start: Account,
    pub age: u32,
    pub count: u32,
}

/// Bulk pull: fetch an account chain down to `end`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkPull {
    pub start: Account,
    pub end: BlockHash,
}

/// Node-ID handshake: a cookie challenge and/or a signed response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeIdHandshake {
    pub query: Option<[u8; 32]>,
    pub response: Option<(Account, Signature)>,
}

/// Any wire message.
#[derive(Clone, Debug)]
pub enum Message {
    Keepalive(Keepalive),
    Publish(Publish),
    ConfirmReq(ConfirmReq),
    ConfirmAck(ConfirmAck),
    FrontierReq(FrontierReq),
    BulkPull(BulkPull),
    BulkPush,
    NodeIdHandshake(NodeIdHandshake),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Keepalive(_) => MessageType::Keepalive,
            Message::Publish(_) => MessageType::Publish,
            Message::ConfirmReq(_) => MessageType::ConfirmReq,
            Message::ConfirmAck(_) => MessageType::ConfirmAck,
            Message::FrontierReq(_) => MessageType::FrontierReq,
            Message::BulkPull(_) => MessageType::BulkPull,
            Message::BulkPush => MessageType::BulkPush,
            Message::NodeIdHandshake(_) => MessageType::NodeIdHandshake,
        }
    }

    /// Full wire encoding: header plus body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut header = MessageHeader::new(self.message_type());
        match self {
            Message::Publish(publish) => header.set_block_type(publish.block.block_type()),
            Message::ConfirmReq(req) => match &req.payload {
                ConfirmReqPayload::Block(block) => header.set_block_type(block.block_type()),
                ConfirmReqPayload::Roots(_) => header.set_block_type(BlockType::NotABlock),
            },
            Message::ConfirmAck(ack) => header.set_block_type(ack.vote.wire_block_type()),
            Message::NodeIdHandshake(handshake) => {
                header.set_query_flag(handshake.query.is_some());
                header.set_response_flag(handshake.response.is_some());
            }
            _ => {}
        }

        let mut buffer = Vec::new();
        header.serialize(&mut buffer);
        match self {
            Message::Keepalive(keepalive) => {
                for peer in &keepalive.peers {
                    serialize_endpoint(&mut buffer, peer);
                }
            }
            Message::Publish(publish) => publish.block.serialize(&mut buffer),
            Message::ConfirmReq(req) => match &req.payload {
                ConfirmReqPayload::Block(block) => block.serialize(&mut buffer),
                ConfirmReqPayload::Roots(pairs) => {
                    buffer.push(pairs.len() as u8);
                    for (root, hash) in pairs {
                        buffer.extend_from_slice(root.as_bytes());
                        buffer.extend_from_slice(hash.as_bytes());
                    }
                }
            },
            Message::ConfirmAck(ack) => ack.vote.serialize(&mut buffer),
            Message::FrontierReq(req) => {
                buffer.extend_from_slice(req.start.as_bytes());
                buffer.extend_from_slice(&req.age.to_le_bytes());
                buffer.extend_from_slice(&req.count.to_le_bytes());
            }
            Message::BulkPull(pull) => {
                buffer.extend_from_slice(pull.start.as_bytes());
                buffer.extend_from_slice(pull.end.as_bytes());
            }
            Message::BulkPush => {}
            Message::NodeIdHandshake(handshake) => {
                if let Some(cookie) = &handshake.query {
                    buffer.extend_from_slice(cookie);
                }
                if let Some((account, signature)) = &handshake.response {
                    buffer.extend_from_slice(account.as_bytes());
                    buffer.extend_from_slice(signature.as_bytes());
                }
            }
        }
        buffer
    }

    /// Decode one full message.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        let mut reader = ByteReader::new(bytes);
        let header = MessageHeader::deserialize(&mut reader)?;
        match header.message_type {
            MessageType::Keepalive => {
                let mut peers = [null_endpoint(); 8];
                for slot in peers.iter_mut() {
                    *slot = deserialize_endpoint(&mut reader)?;
                }
                Ok(Message::Keepalive(Keepalive { peers }))
            }
            MessageType::Publish => {
                let block = Block::deserialize(header.block_type(), &mut reader)?;
                Ok(Message::Publish(Publish {
                    block: Arc::new(block),
                }))
            }
            MessageType::ConfirmReq => {
                if header.block_type() == BlockType::NotABlock {
                    let count = reader.read_u8()? as usize;
                    let mut pairs = Vec::with_capacity(count);
                    for _ in 0..count {
                        let root = reader.read_hash()?;
                        let hash = reader.read_hash()?;
                        pairs.push((root, hash));
                    }
                    Ok(Message::ConfirmReq(ConfirmReq {
                        payload: ConfirmReqPayload::Roots(pairs),
                    }))
                } else {
                    let block = Block::deserialize(header.block_type(), &mut reader)?;
                    Ok(Message::ConfirmReq(ConfirmReq {
                        payload: ConfirmReqPayload::Block(Arc::new(block)),
                    }))
                }
            }
            MessageType::ConfirmAck => {
                let vote = Vote::deserialize(header.block_type(), &mut reader)?;
                Ok(Message::ConfirmAck(ConfirmAck {
                    vote: Arc::new(vote),
                }))
            }
            MessageType::FrontierReq => {
                let start = reader.read_account()?;
                let age_bytes: [u8; 4] = reader.take(4)?.try_into().expect("4 bytes");
                let count_bytes: [u8; 4] = reader.take(4)?.try_into().expect("4 bytes");
                Ok(Message::FrontierReq(FrontierReq {
                    start,
                    age: u32::from_le_bytes(age_bytes),
                    count: u32::from_le_bytes(count_bytes),
                }))
            }
            MessageType::BulkPull => {
                let start = reader.read_account()?;
                let end = reader.read_hash()?;
                Ok(Message::BulkPull(BulkPull { start, end }))
            }
            MessageType::BulkPush => Ok(Message::BulkPush),
            MessageType::NodeIdHandshake => {
                let query = if header.query_flag() {
                    Some(reader.take(32)?.try_into().expect("32 bytes"))
                } else {
                    None
                };
                let response = if header.response_flag() {
                    let account = reader.read_account()?;
                    let signature = reader.read_signature()?;
                    Some((account, signature))
                } else {
                    None
                };
                Ok(Message::NodeIdHandshake(NodeIdHandshake { query, response }))
            }
            MessageType::Invalid | MessageType::NotAType => {
                Err(MessageError::UnknownType(header.message_type as u8))
            }
        }
    }
}
