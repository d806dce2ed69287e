//! The peer container.
//!
//! One canonical record set with secondary indexes: endpoint → record
//! (unique), IP → endpoints (bounded), and an insertion-order list for
//! uniform sampling. Ordered views (by last contact, representative weight,
//! rep-request age, bootstrap age) are derived under the container mutex;
//! the table is small enough that a scan beats maintaining eight live
//! orderings.

use std::collections::{HashMap, HashSet};
use std::net::{Ipv6Addr, SocketAddrV6};
use std::sync::Mutex;
use std::time::Instant;

use almond_types::{
    Account, Amount, RawKey, Signature, NODE_ID_VERSION, PROTOCOL_VERSION_MIN,
};
use rand::seq::SliceRandom;

use crate::null_endpoint;
use crate::syn_cookies::SynCookies;

/// Endpoints probed for being a representative per crawl sweep.
pub const PEERS_PER_CRAWL: usize = 8;
/// Maximum tracked peers per IP address.
pub const MAX_PEERS_PER_IP: usize = 10;

/// Everything known about one peer.
#[derive(Clone, Debug)]
pub struct PeerInfo {
    pub endpoint: SocketAddrV6,
    pub last_contact: Instant,
    pub last_attempt: Instant,
    pub last_bootstrap_attempt: Option<Instant>,
    pub last_rep_request: Option<Instant>,
    pub last_rep_response: Option<Instant>,
    pub rep_weight: Amount,
    pub probable_rep_account: Account,
    pub network_version: u8,
    pub node_id: Option<Account>,
}

impl PeerInfo {
    fn new(endpoint: SocketAddrV6, network_version: u8, now: Instant) -> Self {
        Self {
            endpoint,
            last_contact: now,
            last_attempt: now,
            last_bootstrap_attempt: None,
            last_rep_request: None,
            last_rep_response: None,
            rep_weight: Amount::ZERO,
            probable_rep_account: Account::ZERO,
            network_version,
            node_id: None,
        }
    }
}

type Observer = Box<dyn Fn(&SocketAddrV6) + Send + Sync>;
type DisconnectObserver = Box<dyn Fn() + Send + Sync>;

struct PeersInner {
    /// Canonical records.
    records: HashMap<SocketAddrV6, PeerInfo>,
    /// Insertion order, for uniform sampling.
    order: Vec<SocketAddrV6>,
    /// IP index, capped at [`MAX_PEERS_PER_IP`] entries each.
    by_ip: HashMap<Ipv6Addr, HashSet<SocketAddrV6>>,
    /// Keepalive attempts to endpoints we have not heard from.
    attempts: HashMap<SocketAddrV6, Instant>,
}

impl PeersInner {
    fn remove(&mut self, endpoint: &SocketAddrV6) -> Option<PeerInfo> {
        let info = self.records.remove(endpoint)?;
        self.order.retain(|e| e != endpoint);
        if let Some(set) = self.by_ip.get_mut(endpoint.ip()) {
            set.remove(endpoint);
            if set.is_empty() {
                self.by_ip.remove(endpoint.ip());
            }
        }
        Some(info)
    }
}

/// A multi-indexed set of discovered peers.
pub struct PeerContainer {
    self_endpoint: SocketAddrV6,
    inner: Mutex<PeersInner>,
    syn_cookies: Mutex<SynCookies>,
    peer_observer: Mutex<Option<Observer>>,
    disconnect_observer: Mutex<Option<DisconnectObserver>>,
}

impl PeerContainer {
    pub fn new(self_endpoint: SocketAddrV6) -> Self {
        Self {
            self_endpoint,
            inner: Mutex::new(PeersInner {
                records: HashMap::new(),
                order: Vec::new(),
                by_ip: HashMap::new(),
                attempts: HashMap::new(),
            }),
            syn_cookies: Mutex::new(SynCookies::new()),
            peer_observer: Mutex::new(None),
            disconnect_observer: Mutex::new(None),
        }
    }

    pub fn set_peer_observer(&self, observer: impl Fn(&SocketAddrV6) + Send + Sync + 'static) {
        *self.peer_observer.lock().expect("peer container poisoned") = Some(Box::new(observer));
    }

    pub fn set_disconnect_observer(&self, observer: impl Fn() + Send + Sync + 'static) {
        *self
            .disconnect_observer
            .lock()
            .expect("peer container poisoned") = Some(Box::new(observer));
    }

    /// Endpoints we refuse to peer with: ourselves, the unspecified address,
    /// multicast, and the reserved IPv4 documentation/special ranges.
    pub fn not_a_peer(&self, endpoint: &SocketAddrV6) -> bool {
        if *endpoint == self.self_endpoint {
            return true;
        }
        let ip = endpoint.ip();
        if ip.is_unspecified() || ip.is_multicast() {
            return true;
        }
        if let Some(v4) = ip.to_ipv4_mapped() {
            let octets = v4.octets();
            let reserved = octets[0] == 0
                || (octets[0] == 192 && octets[1] == 0 && octets[2] == 2)
                || (octets[0] == 198 && octets[1] == 51 && octets[2] == 100)
                || (octets[0] == 203 && octets[1] == 0 && octets[2] == 113)
                || octets[0] >= 224;
            if reserved {
                return true;
            }
        }
        false
    }

    /// Record a peer we received from. Returns `true` when the peer was
    /// already present or was rejected; `false` when it is new.
    pub fn insert(&self, endpoint: SocketAddrV6, network_version: u8) -> bool {
        self.insert_with_node_id(endpoint, network_version, None)
    }

    pub fn insert_with_node_id(
        &self,
        endpoint: SocketAddrV6,
        network_version: u8,
        node_id: Option<Account>,
    ) -> bool {
        if self.not_a_peer(&endpoint) || network_version < PROTOCOL_VERSION_MIN {
            return true;
        }
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("peer container poisoned");

        if let Some(info) = inner.records.get_mut(&endpoint) {
            info.last_contact = now;
            info.network_version = network_version;
            if node_id.is_some() {
                info.node_id = node_id;
            }
            return true;
        }

        let ip_peers = inner.by_ip.entry(*endpoint.ip()).or_default();
        if ip_peers.len() >= MAX_PEERS_PER_IP {
            tracing::debug!(ip = %endpoint.ip(), "per-IP peer cap reached");
            return true;
        }
        ip_peers.insert(endpoint);

        let mut info = PeerInfo::new(endpoint, network_version, now);
        info.node_id = node_id;
        inner.records.insert(endpoint, info);
        inner.order.push(endpoint);
        drop(inner);

        if let Some(observer) = self
            .peer_observer
            .lock()
            .expect("peer container poisoned")
            .as_ref()
        {
            observer(&endpoint);
        }
        false
    }

    /// We were contacted by `endpoint`. Returns `true` when a node-ID
    /// handshake should be initiated (new peer with a modern protocol).
    /// Peers below the minimum version are dropped.
    pub fn contacted(&self, endpoint: SocketAddrV6, network_version: u8) -> bool {
        if network_version < PROTOCOL_VERSION_MIN {
            let mut inner = self.inner.lock().expect("peer container poisoned");
            inner.remove(&endpoint);
            return false;
        }
        if network_version >= NODE_ID_VERSION
            && !self.known_peer(&endpoint)
            && !self.not_a_peer(&endpoint)
        {
            return true;
        }
        self.insert(endpoint, network_version);
        false
    }

    pub fn known_peer(&self, endpoint: &SocketAddrV6) -> bool {
        self.inner
            .lock()
            .expect("peer container poisoned")
            .records
            .contains_key(endpoint)
    }

    /// Whether we already reached out (or already know the peer); records
    /// the attempt otherwise. Keepalive loops use this as their idempotence
    /// signal.
    pub fn reachout(&self, endpoint: &SocketAddrV6) -> bool {
        if self.not_a_peer(endpoint) || self.known_peer(endpoint) {
            return true;
        }
        let mut inner = self.inner.lock().expect("peer container poisoned");
        if inner.attempts.contains_key(endpoint) {
            true
        } else {
            inner.attempts.insert(*endpoint, Instant::now());
            false
        }
    }

    /// Erase peers (and attempts) older than `cutoff`; returns the erased
    /// peers and fires the disconnect observer when any were dropped.
    pub fn purge_list(&self, cutoff: Instant) -> Vec<PeerInfo> {
        let mut erased = Vec::new();
        {
            let mut inner = self.inner.lock().expect("peer container poisoned");
            let stale: Vec<SocketAddrV6> = inner
                .records
                .values()
                .filter(|info| info.last_contact < cutoff)
                .map(|info| info.endpoint)
                .collect();
            for endpoint in stale {
                if let Some(info) = inner.remove(&endpoint) {
                    erased.push(info);
                }
            }
            inner.attempts.retain(|_, attempted| *attempted >= cutoff);
        }

        if !erased.is_empty() {
            if let Some(observer) = self
                .disconnect_observer
                .lock()
                .expect("peer container poisoned")
                .as_ref()
            {
                for _ in &erased {
                    observer();
                }
            }
        }
        erased
    }

    /// Fill the array with a uniform random sample; unfilled slots get the
    /// all-zero endpoint.
    pub fn random_fill(&self, target: &mut [SocketAddrV6; 8]) {
        let sample = self.random_set(target.len());
        let mut iter = sample.into_iter();
        for slot in target.iter_mut() {
            *slot = iter.next().unwrap_or_else(null_endpoint);
        }
    }

    /// A uniform random sample of up to `count` distinct peers.
    pub fn random_set(&self, count: usize) -> Vec<SocketAddrV6> {
        let inner = self.inner.lock().expect("peer container poisoned");
        let mut endpoints = inner.order.clone();
        drop(inner);
        let mut rng = rand::thread_rng();
        endpoints.shuffle(&mut rng);
        endpoints.truncate(count);
        endpoints
    }

    pub fn list(&self) -> Vec<SocketAddrV6> {
        self.inner
            .lock()
            .expect("peer container poisoned")
            .order
            .clone()
    }

    /// ⌈√N⌉ random peers — the rebroadcast fanout.
    pub fn list_fanout(&self) -> Vec<SocketAddrV6> {
        let fanout = self.size_sqrt();
        self.random_set(fanout)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().expect("peer container poisoned").records.len()
    }

    pub fn size_sqrt(&self) -> usize {
        (self.size() as f64).sqrt().ceil() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Record a representative advertisement from a peer.
    pub fn rep_response(&self, endpoint: &SocketAddrV6, account: Account, weight: Amount) -> bool {
        let mut inner = self.inner.lock().expect("peer container poisoned");
        match inner.records.get_mut(endpoint) {
            Some(info) => {
                info.probable_rep_account = account;
                info.rep_weight = weight;
                info.last_rep_response = Some(Instant::now());
                true
            }
            None => false,
        }
    }

    /// Note that we probed a peer for its representative status.
    pub fn rep_request(&self, endpoint: &SocketAddrV6) {
        let mut inner = self.inner.lock().expect("peer container poisoned");
        if let Some(info) = inner.records.get_mut(endpoint) {
            info.last_rep_request = Some(Instant::now());
        }
    }

    /// The top `count` known representatives by advertised weight.
    pub fn representatives(&self, count: usize) -> Vec<PeerInfo> {
        let inner = self.inner.lock().expect("peer container poisoned");
        let mut reps: Vec<PeerInfo> = inner
            .records
            .values()
            .filter(|info| !info.rep_weight.is_zero())
            .cloned()
            .collect();
        reps.sort_by(|a, b| b.rep_weight.cmp(&a.rep_weight));
        reps.truncate(count);
        reps
    }

    /// Total advertised representative weight across peers.
    pub fn total_weight(&self) -> Amount {
        let inner = self.inner.lock().expect("peer container poisoned");
        inner
            .records
            .values()
            .fold(Amount::ZERO, |sum, info| sum.saturating_add(info.rep_weight))
    }

    /// The next peers to probe for representative status: least recently
    /// asked first, [`PEERS_PER_CRAWL`] per sweep.
    pub fn rep_crawl(&self) -> Vec<SocketAddrV6> {
        let inner = self.inner.lock().expect("peer container poisoned");
        let mut candidates: Vec<(&Option<Instant>, SocketAddrV6)> = inner
            .records
            .values()
            .map(|info| (&info.last_rep_request, info.endpoint))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(b.0));
        candidates
            .into_iter()
            .take(PEERS_PER_CRAWL)
            .map(|(_, endpoint)| endpoint)
            .collect()
    }

    /// The next peer for a bootstrap attempt (least recently attempted);
    /// stamps the attempt. The null endpoint when no peers are known.
    pub fn bootstrap_peer(&self) -> SocketAddrV6 {
        let mut inner = self.inner.lock().expect("peer container poisoned");
        let candidate = inner
            .records
            .values()
            .min_by(|a, b| a.last_bootstrap_attempt.cmp(&b.last_bootstrap_attempt))
            .map(|info| info.endpoint);
        match candidate {
            Some(endpoint) => {
                if let Some(info) = inner.records.get_mut(&endpoint) {
                    info.last_bootstrap_attempt = Some(Instant::now());
                }
                endpoint
            }
            None => null_endpoint(),
        }
    }

    // ── Handshake cookies (separate lock) ───────────────────────────────

    pub fn assign_syn_cookie(&self, endpoint: &SocketAddrV6) -> Option<[u8; 32]> {
        self.syn_cookies
            .lock()
            .expect("syn cookies poisoned")
            .assign(endpoint)
    }

    pub fn validate_syn_cookie(
        &self,
        endpoint: &SocketAddrV6,
        node_id: &Account,
        signature: &Signature,
    ) -> bool {
        self.syn_cookies
            .lock()
            .expect("syn cookies poisoned")
            .validate(endpoint, node_id, signature)
    }

    pub fn purge_syn_cookies(&self, cutoff: Instant) {
        self.syn_cookies
            .lock()
            .expect("syn cookies poisoned")
            .purge(cutoff)
    }

    /// Build a handshake response for a received cookie.
    pub fn response_for_cookie(cookie: &[u8; 32], node_key: &RawKey) -> Signature {
        almond_crypto::sign_message(node_key, cookie)
    }
}
