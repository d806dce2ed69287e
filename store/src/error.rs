//! Store error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("schema version {stored} is newer than supported version {supported}")]
    SchemaTooNew { stored: u32, supported: u32 },
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
