//! Process-wide ledger constants, fixed at startup.

use almond_types::{Account, Amount, Link, Networks};

use crate::genesis::Genesis;

/// Immutable per-network constants the ledger validates against.
#[derive(Clone)]
pub struct LedgerConstants {
    pub network: Networks,
    pub genesis: Genesis,
    /// Total supply, minted entirely by the genesis block.
    pub genesis_amount: Amount,
    /// The all-zero account; opening it is impossible by construction.
    pub burn_account: Account,
    /// Link value marking a state block as an epoch-1 upgrade.
    pub epoch_link: Link,
    /// The only account allowed to sign epoch blocks.
    pub epoch_signer: Account,
}

impl LedgerConstants {
    pub fn for_network(network: Networks) -> Self {
        let genesis = Genesis::for_network(network);
        let epoch_signer = genesis.account;
        Self {
            network,
            genesis,
            genesis_amount: Amount::MAX,
            burn_account: Account::ZERO,
            epoch_link: epoch_link(),
            epoch_signer,
        }
    }

    /// Test-network constants.
    pub fn test() -> Self {
        Self::for_network(Networks::Test)
    }
}

/// `"epoch v1 block"`, left-aligned in 32 bytes. Distinct from any plausible
/// block hash or account.
fn epoch_link() -> Link {
    let mut bytes = [0u8; 32];
    let tag = b"epoch v1 block";
    bytes[..tag.len()].copy_from_slice(tag);
    Link::new(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_link_is_stable_and_nonzero() {
        let constants = LedgerConstants::test();
        assert!(!constants.epoch_link.is_zero());
        assert_eq!(constants.epoch_link, LedgerConstants::test().epoch_link);
    }

    #[test]
    fn epoch_signer_is_genesis() {
        let constants = LedgerConstants::test();
        assert_eq!(constants.epoch_signer, constants.genesis.account);
    }
}
