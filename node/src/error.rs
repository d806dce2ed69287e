use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] almond_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] almond_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("node is stopped")]
    Stopped,
}
