//! Online representative tracking.
//!
//! A representative counts as online while it has voted within the cutoff
//! window. The live online weight feeds the quorum calculation.

use std::collections::HashMap;

use almond_types::{Account, Amount};

/// Seconds without a vote before a representative drops offline.
pub const ONLINE_WEIGHT_CUTOFF_SECS: u64 = 5 * 60;

/// Tracks which representatives voted recently and their summed weight.
pub struct OnlineReps {
    last_seen: HashMap<Account, u64>,
}

impl OnlineReps {
    pub fn new() -> Self {
        Self {
            last_seen: HashMap::new(),
        }
    }

    /// Record a vote from a representative.
    pub fn observe(&mut self, representative: Account, now: u64) {
        self.last_seen.insert(representative, now);
    }

    /// Drop representatives that have gone quiet.
    pub fn purge(&mut self, now: u64) {
        self.last_seen
            .retain(|_, last| now.saturating_sub(*last) <= ONLINE_WEIGHT_CUTOFF_SECS);
    }

    /// Current online weight, computed against the caller's weight lookup.
    pub fn online_weight(&self, weight_of: impl Fn(&Account) -> Amount) -> Amount {
        self.last_seen
            .keys()
            .fold(Amount::ZERO, |sum, rep| sum.saturating_add(weight_of(rep)))
    }

    pub fn online_count(&self) -> usize {
        self.last_seen.len()
    }
}

impl Default for OnlineReps {
    fn default() -> Self {
        Self::new()
    }
}
