//! Block model for the almond block lattice.
//!
//! Five block shapes share a common hash/root/signature interface: the four
//! legacy variants (send, receive, open, change) and the unified state block.
//! Each block carries a 64-bit proof-of-work nonce and an Ed25519 signature
//! over its canonical Blake2b-256 hash.

pub mod block;
pub mod change;
pub mod open;
pub mod receive;
pub mod send;
pub mod sideband;
pub mod state;
pub mod uniquer;
pub mod wire;

pub use block::{Block, BlockError, BlockType};
pub use change::ChangeBlock;
pub use open::OpenBlock;
pub use receive::ReceiveBlock;
pub use send::SendBlock;
pub use sideband::BlockSideband;
pub use state::StateBlock;
pub use uniquer::BlockUniquer;
