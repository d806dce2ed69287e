//! Peer tracking and gossip fanout.
//!
//! The peer container is the node's view of the network: who contacted us,
//! who answered representative probes with what weight, who to keepalive
//! and who to purge. Handshake cookies live beside it under their own lock
//! so handshakes never contend with hot-path inserts.

pub mod peer_container;
pub mod syn_cookies;

pub use peer_container::{PeerContainer, PeerInfo, MAX_PEERS_PER_IP, PEERS_PER_CRAWL};
pub use syn_cookies::SynCookies;

use std::net::{Ipv6Addr, SocketAddrV6};

/// The all-zero endpoint sentinel.
pub fn null_endpoint() -> SocketAddrV6 {
    SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0)
}
