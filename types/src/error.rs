//! Shared decode error type.

use thiserror::Error;

/// Errors produced when decoding fixed-width values from text or bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string")]
    InvalidHex,

    #[error("invalid account address: {0}")]
    InvalidAddress(String),

    #[error("value out of range")]
    OutOfRange,
}
