//! Node assembly.
//!
//! Owns the long-lived subsystems and the threads that drive them. All
//! inter-subsystem references flow through constructor injection; nothing
//! holds a reference back to the node.

use std::net::{Ipv6Addr, SocketAddrV6};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use almond_blocks::{Block, BlockUniquer};
use almond_consensus::{
    ActiveElections, ElectionStatus, OnlineReps, QuorumConfig, Vote, VoteCode, VoteUniquer,
};
use almond_ledger::{Ledger, LedgerConstants};
use almond_messages::{ConfirmReq, ConfirmReqPayload, Keepalive, Message};
use almond_network::PeerContainer;
use almond_crypto::KeyPair;
use almond_store::{MetaTable, PeerTable, Store, UncheckedTable, VoteTable};
use almond_types::{Amount, BlockHash, Root, PROTOCOL_VERSION};
use almond_work::WorkPool;

use crate::block_processor::{BlockProcessor, ProcessorContext, CONFIRMATION_REQUEST_DELAY};
use crate::config::{NodeConfig, NodeFlags, KEEPALIVE_CUTOFF_SECS, KEEPALIVE_PERIOD_SECS};
use crate::error::NodeError;
use crate::stats::Stats;

/// Elections announced per request-loop round.
const MAX_BROADCAST_REQUESTS: usize = 128;

/// Unchecked entries tolerated before the table is dropped wholesale.
const MAX_UNCHECKED_ENTRIES: u64 = 65_536;

type MessageSink = Box<dyn Fn(SocketAddrV6, Message) + Send + Sync>;

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A running node core.
pub struct Node {
    pub config: NodeConfig,
    pub flags: NodeFlags,
    pub store: Arc<dyn Store>,
    pub ledger: Arc<Ledger>,
    pub active: Arc<ActiveElections>,
    pub peers: Arc<PeerContainer>,
    pub work_pool: Arc<WorkPool>,
    pub processor: Arc<BlockProcessor>,
    pub stats: Arc<Stats>,
    pub block_uniquer: Arc<BlockUniquer>,
    pub vote_uniquer: Arc<VoteUniquer>,
    /// This node's network identity, persisted in the meta table.
    pub node_id: KeyPair,
    pub online_reps: std::sync::Mutex<OnlineReps>,
    message_sink: std::sync::Mutex<Option<MessageSink>>,
    stopped: AtomicBool,
    threads: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Node {
    /// Build a node over an opened store. Initializes the ledger (genesis)
    /// if the store is empty.
    pub fn new(
        config: NodeConfig,
        flags: NodeFlags,
        store: Arc<dyn Store>,
    ) -> Result<Arc<Self>, NodeError> {
        let constants = LedgerConstants::for_network(config.network);
        let ledger = Arc::new(Ledger::new(constants));
        let node_id = {
            let mut txn = store.tx_begin_write()?;
            ledger.initialize(txn.as_mut())?;
            let node_id = match MetaTable::node_id(txn.as_read())? {
                Some(secret) => KeyPair::from_raw(secret),
                None => {
                    let generated = KeyPair::generate();
                    MetaTable::set_node_id(txn.as_mut(), &generated.secret)?;
                    generated
                }
            };
            txn.commit()?;
            node_id
        };

        let quorum = QuorumConfig {
            online_weight_minimum: config.online_weight_minimum()?,
            online_weight_quorum: config.online_weight_quorum,
        };
        let active = Arc::new(ActiveElections::new(quorum));
        let stats = Arc::new(Stats::new());
        let block_uniquer = Arc::new(BlockUniquer::new());
        let vote_uniquer = Arc::new(VoteUniquer::new(block_uniquer.clone()));
        let work_pool = Arc::new(WorkPool::new(config.work_threads, None));
        let self_endpoint =
            SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, config.peering_port, 0, 0);
        let peers = Arc::new(PeerContainer::new(self_endpoint));

        // Re-dial peers seen before the last shutdown.
        {
            let txn = store.tx_begin_read()?;
            if let Ok(stored) = PeerTable::iter(txn.as_ref()) {
                for (endpoint, _) in stored {
                    peers.insert(endpoint, PROTOCOL_VERSION);
                }
            }
        }

        let processor = Arc::new(BlockProcessor::new(ProcessorContext {
            store: store.clone(),
            ledger: ledger.clone(),
            active: active.clone(),
            stats: stats.clone(),
            uniquer: block_uniquer.clone(),
            publish_threshold: config.network.publish_threshold(),
            batch_max_time: Duration::from_millis(config.block_processor_batch_max_time_ms),
        }));

        Ok(Arc::new(Self {
            config,
            flags,
            store,
            ledger,
            active,
            peers,
            work_pool,
            processor,
            stats,
            block_uniquer,
            vote_uniquer,
            node_id,
            online_reps: std::sync::Mutex::new(OnlineReps::new()),
            message_sink: std::sync::Mutex::new(None),
            stopped: AtomicBool::new(false),
            threads: std::sync::Mutex::new(Vec::new()),
        }))
    }

    /// Install the outbound transport. Gossip produced by the internal loops
    /// flows through here; without a sink it is dropped.
    pub fn set_message_sink(&self, sink: impl Fn(SocketAddrV6, Message) + Send + Sync + 'static) {
        *self.message_sink.lock().expect("node poisoned") = Some(Box::new(sink));
    }

    fn send_messages(&self, messages: Vec<(SocketAddrV6, Message)>) {
        let sink = self.message_sink.lock().expect("node poisoned");
        if let Some(sink) = sink.as_ref() {
            for (endpoint, message) in messages {
                sink(endpoint, message);
            }
        }
    }

    /// Spawn the worker threads: block processing and the election sweep.
    pub fn start(self: &Arc<Self>) {
        let mut threads = self.threads.lock().expect("node poisoned");

        let processor = self.processor.clone();
        threads.push(
            std::thread::Builder::new()
                .name("block_processing".to_string())
                .spawn(move || processor.process_blocks())
                .expect("failed to spawn block processing thread"),
        );

        let node = self.clone();
        threads.push(
            std::thread::Builder::new()
                .name("request_loop".to_string())
                .spawn(move || node.request_loop())
                .expect("failed to spawn request loop thread"),
        );
    }

    /// Stop every loop, persist the peer list, drain the queues and join
    /// the threads.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.processor.stop();
        self.persist_peers();
        let mut threads = self.threads.lock().expect("node poisoned");
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }

    fn persist_peers(&self) {
        let endpoints = self.peers.list();
        let now = unix_now();
        if let Ok(mut txn) = self.store.tx_begin_write() {
            for endpoint in endpoints {
                let _ = PeerTable::put(txn.as_mut(), &endpoint, now);
            }
            let _ = txn.commit();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Submit a block that arrived from the live network or the wallet.
    pub fn process_active(&self, block: Arc<Block>) {
        self.processor.add(block);
    }

    /// Ingest a vote: dedup, verify, track the representative online,
    /// persist its latest vote and route it to elections.
    pub fn vote(&self, vote: Arc<Vote>) -> VoteCode {
        let vote = self.vote_uniquer.unique(vote);
        if !vote.validate() {
            self.stats.inc("vote.invalid");
            return VoteCode::Invalid;
        }

        let weight = {
            let txn = match self.store.tx_begin_read() {
                Ok(txn) => txn,
                Err(_) => return VoteCode::Invalid,
            };
            self.ledger.weight(txn.as_ref(), &vote.account)
        };

        self.online_reps
            .lock()
            .expect("node poisoned")
            .observe(vote.account, unix_now());

        if let Ok(mut txn) = self.store.tx_begin_write() {
            let _ = VoteTable::put(txn.as_mut(), &vote.account, &encode_vote(&vote));
            let _ = txn.commit();
        }

        let code = self.active.vote(&vote, weight, unix_now());
        match code {
            VoteCode::Vote => self.stats.inc("vote.valid"),
            VoteCode::Replay => self.stats.inc("vote.replay"),
            VoteCode::Invalid => self.stats.inc("vote.invalid"),
        }
        code
    }

    /// One pass of the confirmation sweep: tally every election against the
    /// current online weight, force-apply winners, and return the outcomes.
    pub fn confirm_round(&self) -> Vec<ElectionStatus> {
        let online_weight = self.online_weight();
        let confirmed = self.active.tally_round(online_weight);
        for status in &confirmed {
            self.stats.inc("election.confirmed");
            tracing::info!(
                winner = %status.winner.hash(),
                tally = %status.tally,
                "election confirmed"
            );
            // The winner displaces whichever sibling got applied first;
            // rollback happens inside forced processing.
            self.processor.force(status.winner.clone());
        }
        confirmed
    }

    /// Current online voting weight from recently seen representatives.
    pub fn online_weight(&self) -> Amount {
        let txn = match self.store.tx_begin_read() {
            Ok(txn) => txn,
            Err(_) => return Amount::ZERO,
        };
        let mut online = self.online_reps.lock().expect("node poisoned");
        online.purge(unix_now());
        online.online_weight(|account| self.ledger.weight(txn.as_ref(), account))
    }

    /// Handle one inbound message. Returns the messages to send in reply,
    /// with their destinations.
    pub fn handle_message(
        &self,
        message: Message,
        from: SocketAddrV6,
        version: u8,
    ) -> Vec<(SocketAddrV6, Message)> {
        let mut outbound = Vec::new();
        let wants_handshake = self.peers.contacted(from, version);
        if wants_handshake {
            if let Some(cookie) = self.peers.assign_syn_cookie(&from) {
                outbound.push((
                    from,
                    Message::NodeIdHandshake(almond_messages::NodeIdHandshake {
                        query: Some(cookie),
                        response: None,
                    }),
                ));
            }
        }

        match message {
            Message::Keepalive(keepalive) => {
                self.stats.inc("message.keepalive");
                for endpoint in keepalive.peers {
                    if endpoint != almond_messages::null_endpoint()
                        && !self.peers.reachout(&endpoint)
                    {
                        let mut peers = [almond_messages::null_endpoint(); 8];
                        self.peers.random_fill(&mut peers);
                        outbound.push((endpoint, Message::Keepalive(Keepalive { peers })));
                    }
                }
            }
            Message::Publish(publish) => {
                self.stats.inc("message.publish");
                self.process_active(publish.block);
            }
            Message::ConfirmReq(req) => {
                self.stats.inc("message.confirm_req");
                match req.payload {
                    ConfirmReqPayload::Block(block) => self.process_active(block),
                    ConfirmReqPayload::Roots(_) => {
                        // Vote solicitation for known roots; voting is the
                        // representative wallet's concern and answered there.
                    }
                }
            }
            Message::ConfirmAck(ack) => {
                self.stats.inc("message.confirm_ack");
                self.vote(ack.vote);
            }
            Message::NodeIdHandshake(handshake) => {
                self.stats.inc("message.node_id_handshake");
                if let Some((node_id, signature)) = handshake.response {
                    if self.peers.validate_syn_cookie(&from, &node_id, &signature) {
                        self.peers.insert_with_node_id(from, version, Some(node_id));
                    }
                }
                if let Some(cookie) = handshake.query {
                    let signature = almond_crypto::sign_message(&self.node_id.secret, &cookie);
                    outbound.push((
                        from,
                        Message::NodeIdHandshake(almond_messages::NodeIdHandshake {
                            query: None,
                            response: Some((self.node_id.public, signature)),
                        }),
                    ));
                }
            }
            Message::FrontierReq(_) | Message::BulkPull(_) | Message::BulkPush => {
                // Bootstrap serving lives with the bootstrap collaborator.
            }
        }
        outbound
    }

    /// Re-announce open elections: one confirm_req of (root, hash) pairs per
    /// election, fanned out to ⌈√N⌉ peers, hardest work first.
    pub fn announce_round(&self) -> Vec<(SocketAddrV6, Message)> {
        let requests = self.active.announcements(MAX_BROADCAST_REQUESTS);
        if requests.is_empty() {
            return Vec::new();
        }
        let fanout = self.peers.list_fanout();
        let mut outbound = Vec::with_capacity(requests.len() * fanout.len());
        for (root, hashes) in requests {
            let pairs: Vec<(Root, BlockHash)> =
                hashes.into_iter().map(|hash| (root.root, hash)).collect();
            let message = Message::ConfirmReq(ConfirmReq {
                payload: ConfirmReqPayload::Roots(pairs),
            });
            for peer in &fanout {
                outbound.push((*peer, message.clone()));
            }
        }
        outbound
    }

    /// Keepalives for a random spread of peers.
    fn keepalive_round(&self) -> Vec<(SocketAddrV6, Message)> {
        let mut peers = [almond_messages::null_endpoint(); 8];
        self.peers.random_fill(&mut peers);
        self.peers
            .list_fanout()
            .into_iter()
            .map(|endpoint| (endpoint, Message::Keepalive(Keepalive { peers })))
            .collect()
    }

    /// Periodic housekeeping loop: confirmation sweeps, announcement
    /// fanout, peer and unchecked purging.
    fn request_loop(self: Arc<Self>) {
        let mut last_unchecked_cleanup = unix_now();
        let mut last_keepalive = 0u64;
        while !self.is_stopped() {
            self.confirm_round();
            let announcements = self.announce_round();
            self.send_messages(announcements);
            let now_instant = std::time::Instant::now();
            if let Some(cutoff) = now_instant.checked_sub(Duration::from_secs(KEEPALIVE_CUTOFF_SECS))
            {
                self.peers.purge_list(cutoff);
            }
            if let Some(cutoff) = now_instant.checked_sub(Duration::from_secs(KEEPALIVE_PERIOD_SECS))
            {
                self.peers.purge_syn_cookies(cutoff);
            }

            let now = unix_now();
            if now.saturating_sub(last_keepalive) >= KEEPALIVE_PERIOD_SECS {
                last_keepalive = now;
                let keepalives = self.keepalive_round();
                self.send_messages(keepalives);
            }
            if !self.flags.disable_unchecked_cleanup
                && now.saturating_sub(last_unchecked_cleanup) >= self.config.unchecked_cutoff_secs
            {
                last_unchecked_cleanup = now;
                self.cleanup_unchecked(now);
            }

            std::thread::sleep(CONFIRMATION_REQUEST_DELAY);
        }
    }

    fn cleanup_unchecked(&self, now: u64) {
        let cutoff = now.saturating_sub(self.config.unchecked_cutoff_secs);
        match self.store.tx_begin_write() {
            Ok(mut txn) => {
                match UncheckedTable::purge_older_than(txn.as_mut(), cutoff) {
                    Ok(removed) if removed > 0 => {
                        tracing::debug!(removed, "purged stale unchecked entries");
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "unchecked purge failed"),
                }
                // Age-based purging can lose the race against a flood; once
                // the table outgrows its bound the backlog is cheaper to
                // re-request than to keep.
                if !self.flags.disable_unchecked_drop {
                    if let Ok(count) = UncheckedTable::count(txn.as_read()) {
                        if count > MAX_UNCHECKED_ENTRIES {
                            if UncheckedTable::clear(txn.as_mut()).is_ok() {
                                tracing::info!(count, "dropped oversized unchecked table");
                            }
                        }
                    }
                }
                let _ = txn.commit();
            }
            Err(err) => tracing::warn!(error = %err, "unchecked purge could not open txn"),
        }
    }
}

/// Votes persist in their wire form, prefixed with the payload block type so
/// they can be decoded without a header.
fn encode_vote(vote: &Vote) -> Vec<u8> {
    let mut framed = vec![vote.wire_block_type() as u8];
    vote.serialize(&mut framed);
    framed
}
