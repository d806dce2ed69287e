//! Statistics counters.
//!
//! Every counter the node exposes through the IPC collaborator, one atomic
//! per name. Unknown names are silently ignored so hot paths never branch
//! on registration state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter names known to the node.
pub const STAT_NAMES: &[&str] = &[
    "ledger.progress",
    "ledger.bad_signature",
    "ledger.old",
    "ledger.negative_spend",
    "ledger.fork",
    "ledger.unreceivable",
    "ledger.gap_previous",
    "ledger.gap_source",
    "ledger.opened_burn_account",
    "ledger.balance_mismatch",
    "ledger.representative_mismatch",
    "ledger.block_position",
    "ledger.rollback",
    "processor.insufficient_work",
    "processor.batch",
    "processor.forced",
    "processor.unchecked_requeued",
    "vote.valid",
    "vote.invalid",
    "vote.replay",
    "message.keepalive",
    "message.publish",
    "message.confirm_req",
    "message.confirm_ack",
    "message.node_id_handshake",
    "election.started",
    "election.confirmed",
];

/// A thread-safe counter collection.
pub struct Stats {
    counters: HashMap<&'static str, AtomicU64>,
}

impl Stats {
    pub fn new() -> Self {
        let mut counters = HashMap::new();
        for &name in STAT_NAMES {
            counters.insert(name, AtomicU64::new(0));
        }
        Self { counters }
    }

    pub fn inc(&self, name: &str) {
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add(&self, name: &str, value: u64) {
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .map(|counter| counter.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<&'static str, u64> {
        self.counters
            .iter()
            .map(|(&name, counter)| (name, counter.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
