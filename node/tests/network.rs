//! Inbound message handling: peer table updates and gossip replies.

mod common;

use std::net::{Ipv6Addr, SocketAddrV6};

use almond_crypto::KeyPair;
use almond_messages::{Keepalive, Message, NodeIdHandshake};
use almond_network::PeerContainer;
use almond_types::{Amount, PROTOCOL_VERSION};
use common::TestNode;

fn loopback(port: u16) -> SocketAddrV6 {
    SocketAddrV6::new(Ipv6Addr::LOCALHOST, port, 0, 0)
}

#[test]
fn keepalive_from_new_peer_triggers_handshake() {
    let fixture = TestNode::new();
    let from = loopback(24000);

    let outbound = fixture.node.handle_message(
        Message::Keepalive(Keepalive::default()),
        from,
        PROTOCOL_VERSION,
    );

    // A fresh modern peer gets a cookie challenge.
    assert!(outbound.iter().any(|(to, message)| {
        *to == from
            && matches!(
                message,
                Message::NodeIdHandshake(NodeIdHandshake { query: Some(_), .. })
            )
    }));
    assert_eq!(fixture.node.stats.get("message.keepalive"), 1);
}

#[test]
fn keepalive_peers_receive_reachout() {
    let fixture = TestNode::new();
    let from = loopback(24000);
    fixture.node.peers.insert(from, PROTOCOL_VERSION);

    let mut keepalive = Keepalive::default();
    keepalive.peers[0] = loopback(24001);
    let outbound =
        fixture
            .node
            .handle_message(Message::Keepalive(keepalive), from, PROTOCOL_VERSION);

    assert!(outbound
        .iter()
        .any(|(to, message)| *to == loopback(24001) && matches!(message, Message::Keepalive(_))));

    // A second keepalive naming the same endpoint doesn't reach out again.
    let mut keepalive = Keepalive::default();
    keepalive.peers[0] = loopback(24001);
    let outbound =
        fixture
            .node
            .handle_message(Message::Keepalive(keepalive), from, PROTOCOL_VERSION);
    assert!(!outbound
        .iter()
        .any(|(to, message)| *to == loopback(24001) && matches!(message, Message::Keepalive(_))));
}

#[test]
fn publish_feeds_the_processor() {
    let fixture = TestNode::new();
    let key1 = KeyPair::generate();
    let send = fixture.send_block(fixture.genesis_hash(), Amount::MAX, key1.public, 100);
    let from = loopback(24000);
    fixture.node.peers.insert(from, PROTOCOL_VERSION);

    fixture.node.handle_message(
        Message::Publish(almond_messages::Publish { block: send.clone() }),
        from,
        PROTOCOL_VERSION,
    );
    fixture.node.processor.drain();

    assert_eq!(fixture.node.stats.get("message.publish"), 1);
    assert_eq!(fixture.node.stats.get("ledger.progress"), 1);
}

#[test]
fn handshake_query_is_answered_with_node_id() {
    let fixture = TestNode::new();
    let from = loopback(24000);
    fixture.node.peers.insert(from, PROTOCOL_VERSION);

    let cookie = [0x5Au8; 32];
    let outbound = fixture.node.handle_message(
        Message::NodeIdHandshake(NodeIdHandshake {
            query: Some(cookie),
            response: None,
        }),
        from,
        PROTOCOL_VERSION,
    );

    let response = outbound.iter().find_map(|(_, message)| match message {
        Message::NodeIdHandshake(NodeIdHandshake {
            response: Some((account, signature)),
            ..
        }) => Some((*account, *signature)),
        _ => None,
    });
    let (account, signature) = response.expect("query answered");
    assert_eq!(account, fixture.node.node_id.public);
    assert!(almond_crypto::validate_message(&account, &cookie, &signature));
}

#[test]
fn node_id_persists_across_restart() {
    use almond_node::{Node, NodeConfig, NodeFlags};
    use almond_store::{MemStore, Store};
    use almond_types::Networks;
    use std::sync::Arc;

    let store: Arc<dyn Store> = Arc::new(MemStore::new());
    let config = NodeConfig::for_network(Networks::Test);

    let first = {
        let node = Node::new(config.clone(), NodeFlags::default(), store.clone()).unwrap();
        node.node_id.public
    };
    let node = Node::new(config, NodeFlags::default(), store).unwrap();
    assert_eq!(node.node_id.public, first);
}

#[test]
fn peers_persist_across_restart() {
    use almond_node::{Node, NodeConfig, NodeFlags};
    use almond_store::{MemStore, Store};
    use almond_types::Networks;
    use std::sync::Arc;

    let store: Arc<dyn Store> = Arc::new(MemStore::new());
    let config = NodeConfig::for_network(Networks::Test);

    let endpoint = loopback(24000);
    {
        let node = Node::new(config.clone(), NodeFlags::default(), store.clone()).unwrap();
        node.peers.insert(endpoint, PROTOCOL_VERSION);
        node.stop();
    }

    let node = Node::new(config, NodeFlags::default(), store).unwrap();
    assert!(node.peers.known_peer(&endpoint));
}

#[test]
fn handshake_response_registers_node_id() {
    let fixture = TestNode::new();
    let from = loopback(24000);
    let node_key = KeyPair::generate();

    let cookie = fixture.node.peers.assign_syn_cookie(&from).unwrap();
    let signature = PeerContainer::response_for_cookie(&cookie, &node_key.secret);

    fixture.node.handle_message(
        Message::NodeIdHandshake(NodeIdHandshake {
            query: None,
            response: Some((node_key.public, signature)),
        }),
        from,
        PROTOCOL_VERSION,
    );

    assert!(fixture.node.peers.known_peer(&from));
    assert_eq!(fixture.node.stats.get("message.node_id_handshake"), 1);
}
