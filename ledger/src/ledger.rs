//! Block application.

use almond_blocks::{Block, BlockSideband, BlockType, ChangeBlock, OpenBlock, ReceiveBlock, SendBlock, StateBlock};
use almond_store::{
    AccountInfo, AccountTable, BlockTable, FrontierTable, PendingInfo, PendingKey, PendingTable,
    ReadTxn, RepWeightTable, SignatureVerification, WriteTxn,
};
use almond_types::{Account, Amount, BlockHash, Epoch, Link, Root};

use crate::result::{ProcessResult, ProcessReturn};
use crate::rollback::RollbackPerformer;
use crate::{LedgerConstants, LedgerError};

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The ledger: pure block-application rules over the store.
pub struct Ledger {
    pub constants: LedgerConstants,
}

impl Ledger {
    pub fn new(constants: LedgerConstants) -> Self {
        Self { constants }
    }

    /// Seed an empty store with the genesis block, frontier entry, account
    /// info and representative weight. Idempotent.
    pub fn initialize(&self, txn: &mut dyn WriteTxn) -> Result<(), LedgerError> {
        let genesis = &self.constants.genesis;
        let hash = genesis.hash();
        if BlockTable::exists(txn.as_read(), &hash)? {
            return Ok(());
        }

        let sideband = BlockSideband::new(
            BlockHash::ZERO,
            genesis.account,
            1,
            self.constants.genesis_amount,
            unix_now(),
            Epoch::Epoch0,
        );
        BlockTable::put(txn, &genesis.block, &sideband)?;
        FrontierTable::put(txn, &hash, &genesis.account)?;
        AccountTable::put(
            txn,
            &genesis.account,
            &AccountInfo {
                head: hash,
                rep_block: hash,
                open_block: hash,
                balance: self.constants.genesis_amount,
                modified: unix_now(),
                block_count: 1,
            },
            Epoch::Epoch0,
        )?;
        RepWeightTable::add(txn, &genesis.account, self.constants.genesis_amount)?;
        tracing::info!(genesis = %hash, network = self.constants.network.as_str(), "ledger initialized");
        Ok(())
    }

    /// Apply one block. All checks run in order; the first failure wins.
    /// `Err` is reserved for storage failures — every verdict on the block
    /// itself comes back as a [`ProcessResult`] code.
    pub fn process(
        &self,
        txn: &mut dyn WriteTxn,
        block: &Block,
        verified: SignatureVerification,
    ) -> Result<ProcessReturn, LedgerError> {
        match block {
            Block::Send(send) => self.process_send(txn, send, verified),
            Block::Receive(receive) => self.process_receive(txn, receive, verified),
            Block::Open(open) => self.process_open(txn, open, verified),
            Block::Change(change) => self.process_change(txn, change, verified),
            Block::State(state) => self.process_state(txn, state, verified),
        }
    }

    /// Is this link value the epoch-1 upgrade marker?
    pub fn is_epoch_link(&self, link: &Link) -> bool {
        *link == self.constants.epoch_link
    }

    // ── Legacy variants ─────────────────────────────────────────────────

    fn process_send(
        &self,
        txn: &mut dyn WriteTxn,
        send: &SendBlock,
        mut verified: SignatureVerification,
    ) -> Result<ProcessReturn, LedgerError> {
        let hash = send.hash();
        if BlockTable::exists(txn.as_read(), &hash)? {
            return Ok(ProcessReturn::rejected(ProcessResult::Old, verified));
        }
        let Some(previous) = BlockTable::get(txn.as_read(), &send.previous)? else {
            return Ok(ProcessReturn::rejected(ProcessResult::GapPrevious, verified));
        };
        // Previous exists but is not a chain head: a second block is
        // competing for the same position.
        let Some(account) = FrontierTable::get(txn.as_read(), &send.previous)? else {
            return Ok(ProcessReturn::rejected(ProcessResult::Fork, verified));
        };
        if verified != SignatureVerification::Valid
            && !almond_crypto::validate_message(&account, hash.as_bytes(), &send.signature)
        {
            return Ok(ProcessReturn::rejected(ProcessResult::BadSignature, verified));
        }
        verified = SignatureVerification::Valid;
        if previous.block.block_type() == BlockType::State {
            return Ok(ProcessReturn::rejected(ProcessResult::BlockPosition, verified));
        }

        let (info, epoch) = self.expect_account(txn.as_read(), &account)?;
        if send.balance > info.balance {
            return Ok(ProcessReturn::rejected(ProcessResult::NegativeSpend, verified));
        }
        let amount = info.balance - send.balance;

        self.append(
            txn,
            &Block::Send(send.clone()),
            &account,
            &info,
            epoch,
            send.balance,
            info.rep_block,
        )?;
        let representative = self.representative_of(txn.as_read(), &info.rep_block)?;
        RepWeightTable::sub(txn, &representative, amount)?;
        PendingTable::put(
            txn,
            &PendingKey::new(send.destination, hash),
            &PendingInfo::new(account, amount, epoch),
        )?;

        Ok(ProcessReturn {
            code: ProcessResult::Progress,
            account,
            amount,
            pending_account: send.destination,
            state_is_send: None,
            verified,
        })
    }

    fn process_receive(
        &self,
        txn: &mut dyn WriteTxn,
        receive: &ReceiveBlock,
        mut verified: SignatureVerification,
    ) -> Result<ProcessReturn, LedgerError> {
        let hash = receive.hash();
        if BlockTable::exists(txn.as_read(), &hash)? {
            return Ok(ProcessReturn::rejected(ProcessResult::Old, verified));
        }
        let Some(previous) = BlockTable::get(txn.as_read(), &receive.previous)? else {
            return Ok(ProcessReturn::rejected(ProcessResult::GapPrevious, verified));
        };
        let Some(account) = FrontierTable::get(txn.as_read(), &receive.previous)? else {
            return Ok(ProcessReturn::rejected(ProcessResult::Fork, verified));
        };
        if verified != SignatureVerification::Valid
            && !almond_crypto::validate_message(&account, hash.as_bytes(), &receive.signature)
        {
            return Ok(ProcessReturn::rejected(ProcessResult::BadSignature, verified));
        }
        verified = SignatureVerification::Valid;
        if previous.block.block_type() == BlockType::State {
            return Ok(ProcessReturn::rejected(ProcessResult::BlockPosition, verified));
        }
        if !BlockTable::exists(txn.as_read(), &receive.source)? {
            return Ok(ProcessReturn::rejected(ProcessResult::GapSource, verified));
        }
        let pending_key = PendingKey::new(account, receive.source);
        let Some(pending) = PendingTable::get(txn.as_read(), &pending_key)? else {
            return Ok(ProcessReturn::rejected(ProcessResult::Unreceivable, verified));
        };
        // Epoch-1 pending entries require a state receive.
        if pending.epoch == Epoch::Epoch1 {
            return Ok(ProcessReturn::rejected(ProcessResult::Unreceivable, verified));
        }

        let (info, epoch) = self.expect_account(txn.as_read(), &account)?;
        let new_balance = info.balance.saturating_add(pending.amount);

        PendingTable::del(txn, &pending_key)?;
        self.append(
            txn,
            &Block::Receive(receive.clone()),
            &account,
            &info,
            epoch,
            new_balance,
            info.rep_block,
        )?;
        let representative = self.representative_of(txn.as_read(), &info.rep_block)?;
        RepWeightTable::add(txn, &representative, pending.amount)?;

        Ok(ProcessReturn {
            code: ProcessResult::Progress,
            account,
            amount: pending.amount,
            pending_account: Account::ZERO,
            state_is_send: None,
            verified,
        })
    }

    fn process_open(
        &self,
        txn: &mut dyn WriteTxn,
        open: &OpenBlock,
        mut verified: SignatureVerification,
    ) -> Result<ProcessReturn, LedgerError> {
        let hash = open.hash();
        if BlockTable::exists(txn.as_read(), &hash)? {
            return Ok(ProcessReturn::rejected(ProcessResult::Old, verified));
        }
        if verified != SignatureVerification::Valid
            && !almond_crypto::validate_message(&open.account, hash.as_bytes(), &open.signature)
        {
            return Ok(ProcessReturn::rejected(ProcessResult::BadSignature, verified));
        }
        verified = SignatureVerification::Valid;
        if !BlockTable::exists(txn.as_read(), &open.source)? {
            return Ok(ProcessReturn::rejected(ProcessResult::GapSource, verified));
        }
        if AccountTable::exists(txn.as_read(), &open.account)? {
            return Ok(ProcessReturn::rejected(ProcessResult::Fork, verified));
        }
        let pending_key = PendingKey::new(open.account, open.source);
        let Some(pending) = PendingTable::get(txn.as_read(), &pending_key)? else {
            return Ok(ProcessReturn::rejected(ProcessResult::Unreceivable, verified));
        };
        if pending.epoch == Epoch::Epoch1 {
            return Ok(ProcessReturn::rejected(ProcessResult::Unreceivable, verified));
        }
        if open.account == self.constants.burn_account {
            return Ok(ProcessReturn::rejected(
                ProcessResult::OpenedBurnAccount,
                verified,
            ));
        }

        PendingTable::del(txn, &pending_key)?;
        let sideband = BlockSideband::new(
            BlockHash::ZERO,
            open.account,
            1,
            pending.amount,
            unix_now(),
            Epoch::Epoch0,
        );
        BlockTable::put(txn, &Block::Open(open.clone()), &sideband)?;
        FrontierTable::put(txn, &hash, &open.account)?;
        AccountTable::put(
            txn,
            &open.account,
            &AccountInfo {
                head: hash,
                rep_block: hash,
                open_block: hash,
                balance: pending.amount,
                modified: unix_now(),
                block_count: 1,
            },
            Epoch::Epoch0,
        )?;
        RepWeightTable::add(txn, &open.representative, pending.amount)?;

        Ok(ProcessReturn {
            code: ProcessResult::Progress,
            account: open.account,
            amount: pending.amount,
            pending_account: Account::ZERO,
            state_is_send: None,
            verified,
        })
    }

    fn process_change(
        &self,
        txn: &mut dyn WriteTxn,
        change: &ChangeBlock,
        mut verified: SignatureVerification,
    ) -> Result<ProcessReturn, LedgerError> {
        let hash = change.hash();
        if BlockTable::exists(txn.as_read(), &hash)? {
            return Ok(ProcessReturn::rejected(ProcessResult::Old, verified));
        }
        let Some(previous) = BlockTable::get(txn.as_read(), &change.previous)? else {
            return Ok(ProcessReturn::rejected(ProcessResult::GapPrevious, verified));
        };
        let Some(account) = FrontierTable::get(txn.as_read(), &change.previous)? else {
            return Ok(ProcessReturn::rejected(ProcessResult::Fork, verified));
        };
        if verified != SignatureVerification::Valid
            && !almond_crypto::validate_message(&account, hash.as_bytes(), &change.signature)
        {
            return Ok(ProcessReturn::rejected(ProcessResult::BadSignature, verified));
        }
        verified = SignatureVerification::Valid;
        if previous.block.block_type() == BlockType::State {
            return Ok(ProcessReturn::rejected(ProcessResult::BlockPosition, verified));
        }

        let (info, epoch) = self.expect_account(txn.as_read(), &account)?;
        let old_representative = self.representative_of(txn.as_read(), &info.rep_block)?;

        self.append(
            txn,
            &Block::Change(change.clone()),
            &account,
            &info,
            epoch,
            info.balance,
            hash,
        )?;
        RepWeightTable::sub(txn, &old_representative, info.balance)?;
        RepWeightTable::add(txn, &change.representative, info.balance)?;

        Ok(ProcessReturn {
            code: ProcessResult::Progress,
            account,
            amount: Amount::ZERO,
            pending_account: Account::ZERO,
            state_is_send: None,
            verified,
        })
    }

    // ── State blocks ────────────────────────────────────────────────────

    fn process_state(
        &self,
        txn: &mut dyn WriteTxn,
        state: &StateBlock,
        verified: SignatureVerification,
    ) -> Result<ProcessReturn, LedgerError> {
        if self.is_epoch_link(&state.link) {
            self.process_epoch(txn, state, verified)
        } else {
            self.process_state_normal(txn, state, verified)
        }
    }

    fn process_state_normal(
        &self,
        txn: &mut dyn WriteTxn,
        state: &StateBlock,
        mut verified: SignatureVerification,
    ) -> Result<ProcessReturn, LedgerError> {
        let hash = state.hash();
        if BlockTable::exists(txn.as_read(), &hash)? {
            return Ok(ProcessReturn::rejected(ProcessResult::Old, verified));
        }
        if verified != SignatureVerification::Valid
            && !almond_crypto::validate_message(&state.account, hash.as_bytes(), &state.signature)
        {
            return Ok(ProcessReturn::rejected(ProcessResult::BadSignature, verified));
        }
        verified = SignatureVerification::Valid;

        let existing = AccountTable::get(txn.as_read(), &state.account)?;
        let (prev_balance, old_rep_block, epoch) = match &existing {
            Some((info, epoch)) => {
                if state.previous.is_zero() {
                    // Second open for an existing chain.
                    return Ok(ProcessReturn::rejected(ProcessResult::Fork, verified));
                }
                if !BlockTable::exists(txn.as_read(), &state.previous)? {
                    return Ok(ProcessReturn::rejected(ProcessResult::GapPrevious, verified));
                }
                if state.previous != info.head {
                    return Ok(ProcessReturn::rejected(ProcessResult::Fork, verified));
                }
                (info.balance, info.rep_block, *epoch)
            }
            None => {
                if !state.previous.is_zero() {
                    return Ok(ProcessReturn::rejected(ProcessResult::GapPrevious, verified));
                }
                if state.account == self.constants.burn_account {
                    return Ok(ProcessReturn::rejected(
                        ProcessResult::OpenedBurnAccount,
                        verified,
                    ));
                }
                (Amount::ZERO, BlockHash::ZERO, Epoch::Epoch0)
            }
        };

        let is_send = state.balance < prev_balance;
        let mut amount = Amount::ZERO;
        let mut pending_account = Account::ZERO;

        if is_send {
            amount = prev_balance - state.balance;
            pending_account = state.link.into();
        } else if state.balance > prev_balance || !state.link.is_zero() {
            // Balance increased, or an explicit link with no delta: a
            // receive, which must match its pending entry exactly.
            amount = state.balance - prev_balance;
            if state.link.is_zero() {
                return Ok(ProcessReturn::rejected(ProcessResult::GapSource, verified));
            }
            if !BlockTable::exists(txn.as_read(), &state.link)? {
                return Ok(ProcessReturn::rejected(ProcessResult::GapSource, verified));
            }
            let pending_key = PendingKey::new(state.account, state.link);
            let Some(pending) = PendingTable::get(txn.as_read(), &pending_key)? else {
                return Ok(ProcessReturn::rejected(ProcessResult::Unreceivable, verified));
            };
            if pending.amount != amount {
                return Ok(ProcessReturn::rejected(ProcessResult::BalanceMismatch, verified));
            }
            PendingTable::del(txn, &pending_key)?;
        }
        // Remaining case: no balance change and zero link — a representative
        // change only.

        // Weight moves wholesale: the old representative loses the previous
        // balance, the named one gains the new balance.
        if let Some((info, _)) = &existing {
            let old_representative = self.representative_of(txn.as_read(), &old_rep_block)?;
            RepWeightTable::sub(txn, &old_representative, info.balance)?;
        }
        RepWeightTable::add(txn, &state.representative, state.balance)?;

        if is_send {
            PendingTable::put(
                txn,
                &PendingKey::new(state.link.into(), hash),
                &PendingInfo::new(state.account, amount, epoch),
            )?;
        }

        let (height, open_block) = match &existing {
            Some((info, _)) => (info.block_count + 1, info.open_block),
            None => (1, hash),
        };
        let sideband = BlockSideband::new(
            BlockHash::ZERO,
            state.account,
            height,
            state.balance,
            unix_now(),
            epoch,
        );
        BlockTable::put(txn, &Block::State(state.clone()), &sideband)?;
        if let Some((info, _)) = &existing {
            BlockTable::set_successor(txn, &info.head, hash)?;
            FrontierTable::del(txn, &info.head)?;
        }
        FrontierTable::put(txn, &hash, &state.account)?;
        AccountTable::put(
            txn,
            &state.account,
            &AccountInfo {
                head: hash,
                rep_block: hash,
                open_block,
                balance: state.balance,
                modified: unix_now(),
                block_count: height,
            },
            epoch,
        )?;

        Ok(ProcessReturn {
            code: ProcessResult::Progress,
            account: state.account,
            amount,
            pending_account,
            state_is_send: Some(is_send),
            verified,
        })
    }

    /// Epoch upgrade: signed by the epoch signer, no balance or
    /// representative change; tags the account as epoch 1.
    fn process_epoch(
        &self,
        txn: &mut dyn WriteTxn,
        state: &StateBlock,
        mut verified: SignatureVerification,
    ) -> Result<ProcessReturn, LedgerError> {
        let hash = state.hash();
        if BlockTable::exists(txn.as_read(), &hash)? {
            return Ok(ProcessReturn::rejected(ProcessResult::Old, verified));
        }
        if verified != SignatureVerification::ValidEpoch
            && !almond_crypto::validate_message(
                &self.constants.epoch_signer,
                hash.as_bytes(),
                &state.signature,
            )
        {
            return Ok(ProcessReturn::rejected(ProcessResult::BadSignature, verified));
        }
        verified = SignatureVerification::ValidEpoch;

        let existing = AccountTable::get(txn.as_read(), &state.account)?;
        match &existing {
            Some((info, epoch)) => {
                if state.previous.is_zero() {
                    return Ok(ProcessReturn::rejected(ProcessResult::Fork, verified));
                }
                if !BlockTable::exists(txn.as_read(), &state.previous)? {
                    return Ok(ProcessReturn::rejected(ProcessResult::GapPrevious, verified));
                }
                if state.previous != info.head {
                    return Ok(ProcessReturn::rejected(ProcessResult::Fork, verified));
                }
                if *epoch == Epoch::Epoch1 {
                    // Already upgraded; an epoch block cannot follow.
                    return Ok(ProcessReturn::rejected(ProcessResult::BlockPosition, verified));
                }
                if state.balance != info.balance {
                    return Ok(ProcessReturn::rejected(ProcessResult::BalanceMismatch, verified));
                }
                let representative = self.representative_of(txn.as_read(), &info.rep_block)?;
                if state.representative != representative {
                    return Ok(ProcessReturn::rejected(
                        ProcessResult::RepresentativeMismatch,
                        verified,
                    ));
                }

                let sideband = BlockSideband::new(
                    BlockHash::ZERO,
                    state.account,
                    info.block_count + 1,
                    state.balance,
                    unix_now(),
                    Epoch::Epoch1,
                );
                BlockTable::put(txn, &Block::State(state.clone()), &sideband)?;
                BlockTable::set_successor(txn, &info.head, hash)?;
                FrontierTable::del(txn, &info.head)?;
                FrontierTable::put(txn, &hash, &state.account)?;
                AccountTable::put(
                    txn,
                    &state.account,
                    &AccountInfo {
                        head: hash,
                        rep_block: hash,
                        open_block: info.open_block,
                        balance: state.balance,
                        modified: unix_now(),
                        block_count: info.block_count + 1,
                    },
                    Epoch::Epoch1,
                )?;
            }
            None => {
                // Epoch-open: prepares an account that has received nothing
                // yet. Balance and representative must both be unset.
                if !state.previous.is_zero() {
                    return Ok(ProcessReturn::rejected(ProcessResult::GapPrevious, verified));
                }
                if state.account == self.constants.burn_account {
                    return Ok(ProcessReturn::rejected(
                        ProcessResult::OpenedBurnAccount,
                        verified,
                    ));
                }
                if !state.balance.is_zero() {
                    return Ok(ProcessReturn::rejected(ProcessResult::BalanceMismatch, verified));
                }
                if !state.representative.is_zero() {
                    return Ok(ProcessReturn::rejected(
                        ProcessResult::RepresentativeMismatch,
                        verified,
                    ));
                }
                let sideband = BlockSideband::new(
                    BlockHash::ZERO,
                    state.account,
                    1,
                    Amount::ZERO,
                    unix_now(),
                    Epoch::Epoch1,
                );
                BlockTable::put(txn, &Block::State(state.clone()), &sideband)?;
                FrontierTable::put(txn, &hash, &state.account)?;
                AccountTable::put(
                    txn,
                    &state.account,
                    &AccountInfo {
                        head: hash,
                        rep_block: hash,
                        open_block: hash,
                        balance: Amount::ZERO,
                        modified: unix_now(),
                        block_count: 1,
                    },
                    Epoch::Epoch1,
                )?;
            }
        }

        Ok(ProcessReturn {
            code: ProcessResult::Progress,
            account: state.account,
            amount: Amount::ZERO,
            pending_account: Account::ZERO,
            state_is_send: Some(false),
            verified,
        })
    }

    // ── Rollback ────────────────────────────────────────────────────────

    /// Undo blocks from the chain head down to and including `hash`,
    /// cascading through chains that already received undone sends.
    /// Returns the rolled-back blocks, head first.
    pub fn rollback(
        &self,
        txn: &mut dyn WriteTxn,
        hash: &BlockHash,
    ) -> Result<Vec<Block>, LedgerError> {
        let mut rolled_back = Vec::new();
        let mut performer = RollbackPerformer::new(self, txn);
        performer.roll_back(hash, &mut rolled_back)?;
        Ok(rolled_back)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Head block of an account, if the account exists.
    pub fn latest(&self, txn: &dyn ReadTxn, account: &Account) -> Option<BlockHash> {
        AccountTable::get(txn, account)
            .ok()
            .flatten()
            .map(|(info, _)| info.head)
    }

    /// Head block, or the account itself for unopened accounts — the root
    /// the next block must cite.
    pub fn latest_root(&self, txn: &dyn ReadTxn, account: &Account) -> Root {
        match self.latest(txn, account) {
            Some(head) => head,
            None => (*account).into(),
        }
    }

    pub fn block_exists(&self, txn: &dyn ReadTxn, hash: &BlockHash) -> bool {
        BlockTable::exists(txn, hash).unwrap_or(false)
    }

    pub fn block(&self, txn: &dyn ReadTxn, hash: &BlockHash) -> Option<Block> {
        BlockTable::get(txn, hash).ok().flatten().map(|e| e.block)
    }

    /// Balance the chain had at `hash`.
    pub fn balance(&self, txn: &dyn ReadTxn, hash: &BlockHash) -> Amount {
        BlockTable::get(txn, hash)
            .ok()
            .flatten()
            .map(|e| e.sideband.balance)
            .unwrap_or(Amount::ZERO)
    }

    /// Current balance of an account.
    pub fn account_balance(&self, txn: &dyn ReadTxn, account: &Account) -> Amount {
        AccountTable::get(txn, account)
            .ok()
            .flatten()
            .map(|(info, _)| info.balance)
            .unwrap_or(Amount::ZERO)
    }

    /// Total amount waiting in pending entries for an account.
    pub fn account_pending(&self, txn: &dyn ReadTxn, account: &Account) -> Amount {
        PendingTable::account_pending(txn, account)
            .map(|entries| {
                entries
                    .iter()
                    .fold(Amount::ZERO, |sum, (_, info)| sum.saturating_add(info.amount))
            })
            .unwrap_or(Amount::ZERO)
    }

    /// Voting weight delegated to a representative.
    pub fn weight(&self, txn: &dyn ReadTxn, representative: &Account) -> Amount {
        RepWeightTable::get(txn, representative).unwrap_or(Amount::ZERO)
    }

    /// The account a block belongs to.
    pub fn account(&self, txn: &dyn ReadTxn, hash: &BlockHash) -> Option<Account> {
        BlockTable::get(txn, hash)
            .ok()
            .flatten()
            .map(|e| e.sideband.account)
    }

    /// Amount transferred by a block (zero for change and epoch blocks).
    pub fn amount(&self, txn: &dyn ReadTxn, hash: &BlockHash) -> Option<Amount> {
        let entry = BlockTable::get(txn, hash).ok().flatten()?;
        let balance = entry.sideband.balance;
        let previous = entry.block.previous();
        let previous_balance = if previous.is_zero() {
            Amount::ZERO
        } else {
            self.balance(txn, &previous)
        };
        Some(if balance >= previous_balance {
            balance - previous_balance
        } else {
            previous_balance - balance
        })
    }

    /// The block that successfully occupies the position `block` lost a fork
    /// for: the sibling already on the chain.
    pub fn forked_block(&self, txn: &dyn ReadTxn, block: &Block) -> Option<Block> {
        let previous = block.previous();
        if !previous.is_zero() {
            if let Some(successor) = BlockTable::successor(txn, &previous).ok().flatten() {
                return self.block(txn, &successor);
            }
        }
        // Fork at the open position: the competing block is the account's
        // open block.
        let account = block.account()?;
        let (info, _) = AccountTable::get(txn, &account).ok().flatten()?;
        self.block(txn, &info.open_block)
    }

    /// Whether every dependency of `block` is already in the ledger.
    pub fn could_fit(&self, txn: &dyn ReadTxn, block: &Block) -> bool {
        let previous = block.previous();
        if !previous.is_zero() && !self.block_exists(txn, &previous) {
            return false;
        }
        match block {
            Block::Receive(receive) => self.block_exists(txn, &receive.source),
            Block::Open(open) => self.block_exists(txn, &open.source),
            Block::State(state) => {
                let is_receive = match AccountTable::get(txn, &state.account).ok().flatten() {
                    Some((info, _)) => state.balance > info.balance,
                    None => !state.balance.is_zero(),
                };
                if is_receive && !self.is_epoch_link(&state.link) {
                    self.block_exists(txn, &state.link)
                } else {
                    true
                }
            }
            _ => true,
        }
    }

    /// The representative named by the chain segment ending at `hash`:
    /// walks back until a block that carries one.
    pub fn representative_calculated(
        &self,
        txn: &dyn ReadTxn,
        hash: &BlockHash,
    ) -> Option<Account> {
        let mut current = *hash;
        loop {
            let entry = BlockTable::get(txn, &current).ok().flatten()?;
            if let Some(representative) = entry.block.representative() {
                return Some(representative);
            }
            let previous = entry.block.previous();
            if previous.is_zero() {
                return None;
            }
            current = previous;
        }
    }

    // ── Internal helpers ────────────────────────────────────────────────

    fn expect_account(
        &self,
        txn: &dyn ReadTxn,
        account: &Account,
    ) -> Result<(AccountInfo, Epoch), LedgerError> {
        AccountTable::get(txn, account)?
            .ok_or_else(|| LedgerError::AccountNotFound(*account))
    }

    /// The representative named by `rep_block` itself.
    pub(crate) fn representative_of(
        &self,
        txn: &dyn ReadTxn,
        rep_block: &BlockHash,
    ) -> Result<Account, LedgerError> {
        let entry = BlockTable::get(txn, rep_block)?
            .ok_or(LedgerError::BlockNotFound(*rep_block))?;
        entry.block.representative().ok_or_else(|| {
            LedgerError::Corruption(format!("rep block {} names no representative", rep_block))
        })
    }

    /// Append a legacy block to an existing chain: block + sideband,
    /// successor pointer, frontier move and account info rewrite.
    #[allow(clippy::too_many_arguments)]
    fn append(
        &self,
        txn: &mut dyn WriteTxn,
        block: &Block,
        account: &Account,
        info: &AccountInfo,
        epoch: Epoch,
        new_balance: Amount,
        rep_block: BlockHash,
    ) -> Result<(), LedgerError> {
        let hash = block.hash();
        let sideband = BlockSideband::new(
            BlockHash::ZERO,
            *account,
            info.block_count + 1,
            new_balance,
            unix_now(),
            epoch,
        );
        BlockTable::put(txn, block, &sideband)?;
        BlockTable::set_successor(txn, &info.head, hash)?;
        FrontierTable::del(txn, &info.head)?;
        FrontierTable::put(txn, &hash, account)?;
        AccountTable::put(
            txn,
            account,
            &AccountInfo {
                head: hash,
                rep_block,
                open_block: info.open_block,
                balance: new_balance,
                modified: unix_now(),
                block_count: info.block_count + 1,
            },
            epoch,
        )?;
        Ok(())
    }
}
