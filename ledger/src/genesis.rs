//! Genesis blocks.
//!
//! Every network starts from a single open block on the genesis account,
//! minting the full supply. The test network's key is public by design so
//! tests and local networks can spend from genesis; beta and live carry
//! only public data.

use almond_blocks::{Block, OpenBlock};
use almond_crypto::KeyPair;
use almond_types::{Account, BlockHash, Networks, RawKey, Signature};

/// Secret key of the test-network genesis account. Publicly known; the test
/// network holds no value.
pub const TEST_GENESIS_KEY: [u8; 32] = *b"ALMOND_TEST_GENESIS_KEY_00000001";

const BETA_GENESIS_ACCOUNT: &str =
    "2298FAB7C61058E77EA554CB93EDEEDA0692CBFCC540AB213B2836B29029E23A";
const BETA_GENESIS_SIGNATURE: &str =
    "A726490E3325E4FA59C1C900D5B6EEBB15FE13D99F49D475B93F0AACC5635929\
     A0614CF3892764A04D1C6732A0D716FFEB254D4154C6F544D11E6630F201450B";
const BETA_GENESIS_WORK: u64 = 0x000c_01e4_43b6_ac98;

const LIVE_GENESIS_ACCOUNT: &str =
    "8F9C7C20869DF1D5A7EA47C783E17AF353FBE1DA46E29B3F0F8FBD5C68B24F59";
const LIVE_GENESIS_SIGNATURE: &str =
    "611C5C1D81A5C46C05894BBCE3D1B861120AF2B9A418E525CB2F107DE343C43E\
     B53D744B24F119B5DAA093E1CEDB4FDE4A17F0ECA67E4A3DB7659122D8230C03";
const LIVE_GENESIS_WORK: u64 = 0x6230_9c42_bfc2_35cd;

/// The genesis open block and account for one network.
#[derive(Clone)]
pub struct Genesis {
    pub account: Account,
    pub block: Block,
}

impl Genesis {
    pub fn for_network(network: Networks) -> Self {
        match network {
            Networks::Test => Self::signed(KeyPair::from_raw(RawKey::new(TEST_GENESIS_KEY))),
            Networks::Beta => Self::embedded(
                BETA_GENESIS_ACCOUNT,
                BETA_GENESIS_SIGNATURE,
                BETA_GENESIS_WORK,
            ),
            Networks::Live => Self::embedded(
                LIVE_GENESIS_ACCOUNT,
                LIVE_GENESIS_SIGNATURE,
                LIVE_GENESIS_WORK,
            ),
        }
    }

    pub fn hash(&self) -> BlockHash {
        self.block.hash()
    }

    /// The genesis open block: source and representative are the genesis
    /// account itself.
    fn open_for(account: Account) -> OpenBlock {
        OpenBlock {
            source: account.into(),
            representative: account,
            account,
            signature: Signature::ZERO,
            work: 0,
        }
    }

    fn signed(keypair: KeyPair) -> Self {
        let mut open = Self::open_for(keypair.public);
        open.signature = almond_crypto::sign_message(&keypair.secret, open.hash().as_bytes());
        Self {
            account: keypair.public,
            block: Block::Open(open),
        }
    }

    fn embedded(account_hex: &str, signature_hex: &str, work: u64) -> Self {
        let account = Account::decode_hex(account_hex).expect("embedded genesis account");
        let signature_bytes =
            hex::decode(signature_hex.replace(char::is_whitespace, "")).expect("genesis signature");
        let mut open = Self::open_for(account);
        open.signature = Signature(
            signature_bytes
                .try_into()
                .expect("genesis signature is 64 bytes"),
        );
        open.work = work;
        Self {
            account,
            block: Block::Open(open),
        }
    }
}
