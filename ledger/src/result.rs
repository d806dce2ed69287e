//! Block application results.

use almond_store::SignatureVerification;
use almond_types::{Account, Amount};

/// Outcome of applying one block. The first failed check wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessResult {
    /// Hasn't been seen before, valid in every respect.
    Progress,
    /// Signature was bad — forged or transmission error.
    BadSignature,
    /// Already seen and was valid.
    Old,
    /// Malicious attempt to spend a negative amount.
    NegativeSpend,
    /// Malicious fork based on previous.
    Fork,
    /// Source block doesn't exist, was already received, or requires an
    /// account upgrade.
    Unreceivable,
    /// The block's previous is unknown.
    GapPrevious,
    /// The block's source is unknown.
    GapSource,
    /// Someone claims to have found the private key of the all-zero account.
    OpenedBurnAccount,
    /// Balance and amount delta don't match.
    BalanceMismatch,
    /// Representative changed where that is not allowed.
    RepresentativeMismatch,
    /// This block cannot follow its previous block.
    BlockPosition,
}

/// Everything the caller learns from `Ledger::process`.
#[derive(Clone, Debug)]
pub struct ProcessReturn {
    pub code: ProcessResult,
    /// Owning account, filled on `Progress`.
    pub account: Account,
    /// Amount transferred by the block, if any.
    pub amount: Amount,
    /// For sends: the account the pending entry was created for.
    pub pending_account: Account,
    /// For state blocks: whether the block turned out to be a send.
    pub state_is_send: Option<bool>,
    /// How far signature verification got.
    pub verified: SignatureVerification,
}

impl ProcessReturn {
    pub(crate) fn rejected(code: ProcessResult, verified: SignatureVerification) -> Self {
        Self {
            code,
            account: Account::ZERO,
            amount: Amount::ZERO,
            pending_account: Account::ZERO,
            state_is_send: None,
            verified,
        }
    }
}
