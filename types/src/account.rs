//! Account identifiers.
//!
//! An account is a 256-bit Ed25519 public key. The same type doubles as the
//! representative tag on blocks and as the node ID in handshakes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte Ed25519 public key identifying an account chain.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Account([u8; 32]);

impl Account {
    /// The burn account — the all-zero public key. Funds sent here are
    /// unspendable; opening this account is a protocol violation.
    pub const ZERO: Self = Self([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn encode_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    pub fn decode_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl From<crate::BlockHash> for Account {
    fn from(hash: crate::BlockHash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex: String = self.0[..4].iter().map(|b| format!("{:02X}", b)).collect();
        write!(f, "Account({}…)", hex)
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burn_account_is_zero() {
        assert!(Account::ZERO.is_zero());
    }

    #[test]
    fn hex_round_trip() {
        let a = Account::new([0x42; 32]);
        assert_eq!(Account::decode_hex(&a.encode_hex()), Some(a));
    }

    #[test]
    fn hash_account_conversion_preserves_bytes() {
        let a = Account::new([7u8; 32]);
        let h: crate::BlockHash = a.into();
        let back: Account = h.into();
        assert_eq!(a, back);
    }
}
