//! The almond daemon.
//!
//! Opens (and migrates) the data directory, assembles the node core and
//! runs it until interrupted. Fatal conditions exit non-zero.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use almond_node::{logging, Node, NodeConfig, NodeFlags};
use almond_store::Store;
use almond_store_lmdb::{LmdbStore, Migrator, DEFAULT_MAP_SIZE};
use almond_types::Networks;

#[derive(Parser, Debug)]
#[command(name = "almond-daemon", about = "almond currency node daemon")]
struct Cli {
    /// Data directory for the ledger and configuration.
    #[arg(long, env = "ALMOND_DATA_PATH")]
    data_path: Option<PathBuf>,

    /// Network to join: test, beta or live.
    #[arg(long, default_value = "live")]
    network: String,

    /// Disable automatic wallet backups.
    #[arg(long)]
    disable_backup: bool,

    /// Disable lazy bootstrap.
    #[arg(long)]
    disable_lazy_bootstrap: bool,

    /// Disable legacy bootstrap.
    #[arg(long)]
    disable_legacy_bootstrap: bool,

    /// Disable wallet-driven bootstrap.
    #[arg(long)]
    disable_wallet_bootstrap: bool,

    /// Do not listen for incoming bootstrap connections.
    #[arg(long)]
    disable_bootstrap_listener: bool,

    /// Skip the periodic unchecked-table purge.
    #[arg(long)]
    disable_unchecked_cleanup: bool,

    /// Never clear the unchecked table wholesale during bootstrap.
    #[arg(long)]
    disable_unchecked_drop: bool,

    /// Trade safety checks for bootstrap throughput.
    #[arg(long)]
    fast_bootstrap: bool,

    /// Batch size for sideband upgrades.
    #[arg(long, default_value_t = 512)]
    sideband_batch_size: usize,
}

fn data_path_for(cli: &Cli, network: Networks) -> PathBuf {
    if let Some(path) = &cli.data_path {
        return path.clone();
    }
    let base = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    match network {
        Networks::Live => base.join("Almond"),
        Networks::Beta => base.join("AlmondBeta"),
        Networks::Test => base.join("AlmondTest"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();

    let network = Networks::from_str_opt(&cli.network)
        .with_context(|| format!("unknown network {:?}", cli.network))?;
    let data_path = data_path_for(&cli, network);

    let config_path = data_path.join("config-node.toml");
    let mut config = if config_path.exists() {
        NodeConfig::from_toml_file(&config_path).context("reading config-node.toml")?
    } else {
        NodeConfig::for_network(network)
    };
    config.network = network;

    let flags = NodeFlags {
        disable_backup: cli.disable_backup,
        disable_lazy_bootstrap: cli.disable_lazy_bootstrap,
        disable_legacy_bootstrap: cli.disable_legacy_bootstrap,
        disable_wallet_bootstrap: cli.disable_wallet_bootstrap,
        disable_bootstrap_listener: cli.disable_bootstrap_listener,
        disable_unchecked_cleanup: cli.disable_unchecked_cleanup,
        disable_unchecked_drop: cli.disable_unchecked_drop,
        fast_bootstrap: cli.fast_bootstrap,
        sideband_batch_size: cli.sideband_batch_size,
    };

    tracing::info!(
        network = network.as_str(),
        path = %data_path.display(),
        "starting almond daemon"
    );

    let store = LmdbStore::open(&data_path.join("data.ldb"), DEFAULT_MAP_SIZE, config.lmdb_max_dbs)
        .context("opening ledger store")?;
    Migrator::run(&store).context("migrating database schema")?;
    let store: Arc<dyn Store> = Arc::new(store);

    let node = Node::new(config, flags, store).context("assembling node")?;
    node.start();

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    node.stop();
    Ok(())
}
