//! The node core.
//!
//! Wires storage, the ledger, the work pool, the peer container and active
//! elections together, and runs the serialized block-processing pipeline
//! that feeds them.

pub mod block_processor;
pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod stats;

pub use block_processor::{BlockProcessor, ProcessorContext, CONFIRMATION_REQUEST_DELAY};
pub use config::{NodeConfig, NodeFlags};
pub use error::NodeError;
pub use node::Node;
pub use stats::Stats;
