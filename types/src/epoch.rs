//! Epoch tags.
//!
//! Each account, pending entry and state block carries an epoch tag so
//! protocol upgrades can be rolled out without rewriting history.

use serde::{Deserialize, Serialize};

/// Which epoch an entry belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Epoch {
    Invalid = 0,
    Unspecified = 1,
    Epoch0 = 2,
    Epoch1 = 3,
}

impl Epoch {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Epoch::Unspecified,
            2 => Epoch::Epoch0,
            3 => Epoch::Epoch1,
            _ => Epoch::Invalid,
        }
    }
}

impl Default for Epoch {
    fn default() -> Self {
        Epoch::Epoch0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_u8_round_trip() {
        for epoch in [Epoch::Unspecified, Epoch::Epoch0, Epoch::Epoch1] {
            assert_eq!(Epoch::from_u8(epoch as u8), epoch);
        }
        assert_eq!(Epoch::from_u8(0), Epoch::Invalid);
        assert_eq!(Epoch::from_u8(99), Epoch::Invalid);
    }

    #[test]
    fn epoch1_is_newer_than_epoch0() {
        assert!(Epoch::Epoch1 > Epoch::Epoch0);
    }
}
