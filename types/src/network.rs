//! Network selection and protocol constants.
//!
//! The active network is chosen once at startup and installed as part of the
//! process-wide ledger constants; it is never mutated afterwards.

use serde::{Deserialize, Serialize};

/// Highest protocol version this node speaks.
pub const PROTOCOL_VERSION: u8 = 0x10;
/// Oldest protocol version we will talk to at all.
pub const PROTOCOL_VERSION_MIN: u8 = 0x0d;
/// Minimum version for which a node-ID handshake is initiated.
pub const NODE_ID_VERSION: u8 = 0x0c;

/// Network variants with different genesis blocks and work parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Networks {
    /// Low work parameters, publicly known genesis key, test ports.
    Test,
    /// Normal work parameters, beta genesis.
    Beta,
    /// Normal work parameters, live genesis.
    Live,
}

impl Networks {
    /// Proof-of-work publish threshold. ~5 seconds of CPU work on live.
    pub fn publish_threshold(&self) -> u64 {
        match self {
            Networks::Test => 0xff00_0000_0000_0000,
            Networks::Beta | Networks::Live => 0xffff_ffc0_0000_0000,
        }
    }

    /// Default peering port.
    pub fn default_port(&self) -> u16 {
        match self {
            Networks::Test => 44000,
            Networks::Beta => 54000,
            Networks::Live => 7075,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Networks::Test => "test",
            Networks::Beta => "beta",
            Networks::Live => "live",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "test" => Some(Networks::Test),
            "beta" => Some(Networks::Beta),
            "live" => Some(Networks::Live),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_threshold_is_harder_than_test() {
        // Work passes when the work value is >= the threshold.
        assert_eq!(Networks::Test.publish_threshold(), 0xff00_0000_0000_0000);
        assert_eq!(Networks::Live.publish_threshold(), 0xffff_ffc0_0000_0000);
        assert!(Networks::Live.publish_threshold() > Networks::Test.publish_threshold());
    }

    #[test]
    fn name_round_trip() {
        for net in [Networks::Test, Networks::Beta, Networks::Live] {
            assert_eq!(Networks::from_str_opt(net.as_str()), Some(net));
        }
        assert_eq!(Networks::from_str_opt("mainnet"), None);
    }
}
