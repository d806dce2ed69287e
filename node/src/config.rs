//! Node configuration and runtime flags.

use serde::{Deserialize, Serialize};

use almond_types::{Amount, Networks};

use crate::NodeError;

/// How long a keepalive-silent peer survives before purging.
pub const KEEPALIVE_PERIOD_SECS: u64 = 60;
pub const KEEPALIVE_CUTOFF_SECS: u64 = KEEPALIVE_PERIOD_SECS * 5;

/// Node configuration, loadable from TOML.
///
/// Amount-valued fields are strings of raw units; TOML integers cannot hold
/// 128-bit values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_network")]
    pub network: Networks,

    #[serde(default = "default_peering_port")]
    pub peering_port: u16,

    #[serde(default)]
    pub preconfigured_peers: Vec<String>,

    /// `alm_` addresses of representatives to request votes from initially.
    #[serde(default)]
    pub preconfigured_representatives: Vec<String>,

    /// Smallest send the wallet collaborator will auto-receive (raw).
    #[serde(default = "default_receive_minimum")]
    pub receive_minimum: String,

    /// Weight below which a representative's votes are not rebroadcast (raw).
    #[serde(default = "default_vote_minimum")]
    pub vote_minimum: String,

    /// Online weight floor used by the quorum calculation (raw).
    #[serde(default = "default_online_weight_minimum")]
    pub online_weight_minimum: String,

    /// Percent of the reference online weight a winner must exceed.
    #[serde(default = "default_online_weight_quorum")]
    pub online_weight_quorum: u8,

    #[serde(default = "default_io_threads")]
    pub io_threads: usize,

    #[serde(default = "default_network_threads")]
    pub network_threads: usize,

    #[serde(default = "default_work_threads")]
    pub work_threads: usize,

    #[serde(default = "default_signature_checker_threads")]
    pub signature_checker_threads: usize,

    /// Whether this node generates votes for its configured representative.
    #[serde(default)]
    pub enable_voting: bool,

    #[serde(default = "default_bootstrap_connections")]
    pub bootstrap_connections: u32,

    #[serde(default = "default_bootstrap_connections_max")]
    pub bootstrap_connections_max: u32,

    #[serde(default = "default_lmdb_max_dbs")]
    pub lmdb_max_dbs: u32,

    /// Upper bound on the time one block-processor batch may hold the write
    /// transaction, in milliseconds.
    #[serde(default = "default_block_processor_batch_max_time_ms")]
    pub block_processor_batch_max_time_ms: u64,

    /// Age after which unchecked entries are purged, in seconds.
    #[serde(default = "default_unchecked_cutoff_secs")]
    pub unchecked_cutoff_secs: u64,
}

fn default_network() -> Networks {
    Networks::Live
}

fn default_peering_port() -> u16 {
    Networks::Live.default_port()
}

fn default_receive_minimum() -> String {
    almond_types::amount::ALM_RATIO.to_string()
}

fn default_vote_minimum() -> String {
    "0".to_string()
}

fn default_online_weight_minimum() -> String {
    // 60 MALM in raw units.
    "6000000000".to_string()
}

fn default_online_weight_quorum() -> u8 {
    50
}

fn default_io_threads() -> usize {
    4
}

fn default_network_threads() -> usize {
    2
}

fn default_work_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_signature_checker_threads() -> usize {
    2
}

fn default_bootstrap_connections() -> u32 {
    4
}

fn default_bootstrap_connections_max() -> u32 {
    64
}

fn default_lmdb_max_dbs() -> u32 {
    128
}

fn default_block_processor_batch_max_time_ms() -> u64 {
    5000
}

fn default_unchecked_cutoff_secs() -> u64 {
    4 * 60 * 60
}

impl NodeConfig {
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    pub fn receive_minimum(&self) -> Result<Amount, NodeError> {
        Amount::decode_dec(&self.receive_minimum)
            .ok_or_else(|| NodeError::Config("receive_minimum is not a raw amount".into()))
    }

    pub fn vote_minimum(&self) -> Result<Amount, NodeError> {
        Amount::decode_dec(&self.vote_minimum)
            .ok_or_else(|| NodeError::Config("vote_minimum is not a raw amount".into()))
    }

    pub fn online_weight_minimum(&self) -> Result<Amount, NodeError> {
        Amount::decode_dec(&self.online_weight_minimum)
            .ok_or_else(|| NodeError::Config("online_weight_minimum is not a raw amount".into()))
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::for_network(default_network())
    }
}

impl NodeConfig {
    pub fn for_network(network: Networks) -> Self {
        Self {
            network,
            peering_port: network.default_port(),
            preconfigured_peers: Vec::new(),
            preconfigured_representatives: Vec::new(),
            receive_minimum: default_receive_minimum(),
            vote_minimum: default_vote_minimum(),
            online_weight_minimum: default_online_weight_minimum(),
            online_weight_quorum: default_online_weight_quorum(),
            io_threads: default_io_threads(),
            network_threads: default_network_threads(),
            work_threads: default_work_threads(),
            signature_checker_threads: default_signature_checker_threads(),
            enable_voting: false,
            bootstrap_connections: default_bootstrap_connections(),
            bootstrap_connections_max: default_bootstrap_connections_max(),
            lmdb_max_dbs: default_lmdb_max_dbs(),
            block_processor_batch_max_time_ms: default_block_processor_batch_max_time_ms(),
            unchecked_cutoff_secs: default_unchecked_cutoff_secs(),
        }
    }
}

/// Runtime switches, set from the command line rather than the config file.
#[derive(Clone, Debug, Default)]
pub struct NodeFlags {
    pub disable_backup: bool,
    pub disable_lazy_bootstrap: bool,
    pub disable_legacy_bootstrap: bool,
    pub disable_wallet_bootstrap: bool,
    pub disable_bootstrap_listener: bool,
    /// Skip the periodic age-based purge of the unchecked table.
    pub disable_unchecked_cleanup: bool,
    /// Skip the wholesale unchecked clear during bootstrap overflow.
    pub disable_unchecked_drop: bool,
    pub fast_bootstrap: bool,
    pub sideband_batch_size: usize,
}
