//! Per-variant block rollback.
//!
//! Blocks are undone head-first, so every removal happens at a frontier.
//! Undoing a send whose pending entry is gone means the destination already
//! received it — the destination chain is rolled back first, recursively,
//! until the pending entry reappears.

use almond_blocks::Block;
use almond_store::{
    AccountInfo, AccountTable, BlockTable, FrontierTable, PendingInfo, PendingKey, PendingTable,
    RepWeightTable, WriteTxn,
};
use almond_types::{Account, Amount, BlockHash, Epoch};

use crate::{Ledger, LedgerError};

/// Hard bound on cascade recursion; a deeper chain of dependent receives
/// indicates corruption, not a legitimate fork.
const MAX_CASCADE_DEPTH: u32 = 4096;

pub(crate) struct RollbackPerformer<'a> {
    ledger: &'a Ledger,
    txn: &'a mut dyn WriteTxn,
    depth: u32,
}

impl<'a> RollbackPerformer<'a> {
    pub(crate) fn new(ledger: &'a Ledger, txn: &'a mut dyn WriteTxn) -> Self {
        Self {
            ledger,
            txn,
            depth: 0,
        }
    }

    /// Undo blocks from the owning account's head back to and including
    /// `target`, appending each undone block to `rolled_back`.
    pub(crate) fn roll_back(
        &mut self,
        target: &BlockHash,
        rolled_back: &mut Vec<Block>,
    ) -> Result<(), LedgerError> {
        if self.depth > MAX_CASCADE_DEPTH {
            return Err(LedgerError::Corruption("rollback cascade too deep".into()));
        }
        let account = self
            .ledger
            .account(self.txn.as_read(), target)
            .ok_or(LedgerError::BlockNotFound(*target))?;

        while BlockTable::exists(self.txn.as_read(), target)? {
            let (info, epoch) = AccountTable::get(self.txn.as_read(), &account)?
                .ok_or(LedgerError::AccountNotFound(account))?;
            let head = BlockTable::get(self.txn.as_read(), &info.head)?
                .ok_or(LedgerError::BlockNotFound(info.head))?;
            self.undo_one(&head.block, &account, &info, epoch, rolled_back)?;
        }
        Ok(())
    }

    fn undo_one(
        &mut self,
        block: &Block,
        account: &Account,
        info: &AccountInfo,
        epoch: Epoch,
        rolled_back: &mut Vec<Block>,
    ) -> Result<(), LedgerError> {
        let hash = block.hash();
        debug_assert_eq!(hash, info.head, "rollback must start at the head");

        match block {
            Block::Send(send) => {
                let amount = self
                    .ledger
                    .amount(self.txn.as_read(), &hash)
                    .ok_or(LedgerError::BlockNotFound(hash))?;
                self.unreceive(&PendingKey::new(send.destination, hash), rolled_back)?;
                let representative =
                    self.ledger.representative_of(self.txn.as_read(), &info.rep_block)?;
                RepWeightTable::add(self.txn, &representative, amount)?;
                self.rewind(block, account, info, epoch, info.rep_block)?;
            }
            Block::Receive(receive) => {
                let amount = self
                    .ledger
                    .amount(self.txn.as_read(), &hash)
                    .ok_or(LedgerError::BlockNotFound(hash))?;
                let source_account = self
                    .ledger
                    .account(self.txn.as_read(), &receive.source)
                    .unwrap_or(Account::ZERO);
                let representative =
                    self.ledger.representative_of(self.txn.as_read(), &info.rep_block)?;
                RepWeightTable::sub(self.txn, &representative, amount)?;
                PendingTable::put(
                    self.txn,
                    &PendingKey::new(*account, receive.source),
                    &PendingInfo::new(source_account, amount, Epoch::Epoch0),
                )?;
                self.rewind(block, account, info, epoch, info.rep_block)?;
            }
            Block::Open(open) => {
                let source_account = self
                    .ledger
                    .account(self.txn.as_read(), &open.source)
                    .unwrap_or(Account::ZERO);
                RepWeightTable::sub(self.txn, &open.representative, info.balance)?;
                PendingTable::put(
                    self.txn,
                    &PendingKey::new(*account, open.source),
                    &PendingInfo::new(source_account, info.balance, Epoch::Epoch0),
                )?;
                BlockTable::del(self.txn, &hash)?;
                FrontierTable::del(self.txn, &hash)?;
                AccountTable::del(self.txn, account)?;
            }
            Block::Change(change) => {
                let previous_rep = self
                    .ledger
                    .representative_calculated(self.txn.as_read(), &change.previous)
                    .ok_or_else(|| {
                        LedgerError::Corruption("change block with no prior representative".into())
                    })?;
                RepWeightTable::sub(self.txn, &change.representative, info.balance)?;
                RepWeightTable::add(self.txn, &previous_rep, info.balance)?;
                let rep_block = self.rep_block_of(&change.previous)?;
                self.rewind(block, account, info, epoch, rep_block)?;
            }
            Block::State(state) => {
                let previous_balance = if state.previous.is_zero() {
                    Amount::ZERO
                } else {
                    self.ledger.balance(self.txn.as_read(), &state.previous)
                };
                let is_send = state.balance < previous_balance;

                RepWeightTable::sub(self.txn, &state.representative, state.balance)?;
                if !state.previous.is_zero() {
                    let previous_rep = self
                        .ledger
                        .representative_calculated(self.txn.as_read(), &state.previous)
                        .ok_or_else(|| {
                            LedgerError::Corruption("state block with no prior representative".into())
                        })?;
                    RepWeightTable::add(self.txn, &previous_rep, previous_balance)?;
                }

                if is_send {
                    self.unreceive(&PendingKey::new(state.link.into(), hash), rolled_back)?;
                } else if !state.link.is_zero() && !self.ledger.is_epoch_link(&state.link) {
                    let amount = state.balance - previous_balance;
                    let source = BlockTable::get(self.txn.as_read(), &state.link)?;
                    let (source_account, source_epoch) = source
                        .map(|entry| (entry.sideband.account, entry.sideband.epoch))
                        .unwrap_or((Account::ZERO, Epoch::Epoch0));
                    PendingTable::put(
                        self.txn,
                        &PendingKey::new(*account, state.link),
                        &PendingInfo::new(source_account, amount, source_epoch),
                    )?;
                }

                if state.previous.is_zero() {
                    BlockTable::del(self.txn, &hash)?;
                    FrontierTable::del(self.txn, &hash)?;
                    AccountTable::del(self.txn, account)?;
                } else {
                    // An epoch-block rollback drops the account back to the
                    // previous block's epoch tag.
                    let previous_epoch = BlockTable::get(self.txn.as_read(), &state.previous)?
                        .map(|entry| entry.sideband.epoch)
                        .unwrap_or(Epoch::Epoch0);
                    let rep_block = self.rep_block_of(&state.previous)?;
                    self.rewind(block, account, info, previous_epoch, rep_block)?;
                }
            }
        }

        rolled_back.push(block.clone());
        tracing::debug!(hash = %hash, kind = ?block.block_type(), "rolled back block");
        Ok(())
    }

    /// Ensure the pending entry exists before deleting it — if the
    /// destination already received the send, roll its chain back first.
    fn unreceive(
        &mut self,
        key: &PendingKey,
        rolled_back: &mut Vec<Block>,
    ) -> Result<(), LedgerError> {
        while !PendingTable::exists(self.txn.as_read(), key)? {
            let latest = self
                .ledger
                .latest(self.txn.as_read(), &key.destination)
                .ok_or(LedgerError::AccountNotFound(key.destination))?;
            self.depth += 1;
            self.roll_back(&latest, rolled_back)?;
            self.depth -= 1;
        }
        PendingTable::del(self.txn, key)
            .map_err(LedgerError::from)
    }

    /// The hash whose block named the representative as of `hash`.
    fn rep_block_of(&self, hash: &BlockHash) -> Result<BlockHash, LedgerError> {
        let mut current = *hash;
        loop {
            let entry = BlockTable::get(self.txn.as_read(), &current)?
                .ok_or(LedgerError::BlockNotFound(current))?;
            if entry.block.representative().is_some() {
                return Ok(current);
            }
            let previous = entry.block.previous();
            if previous.is_zero() {
                return Err(LedgerError::Corruption(
                    "chain names no representative".into(),
                ));
            }
            current = previous;
        }
    }

    /// Rewind the account to the block's predecessor.
    fn rewind(
        &mut self,
        block: &Block,
        account: &Account,
        info: &AccountInfo,
        epoch: Epoch,
        rep_block: BlockHash,
    ) -> Result<(), LedgerError> {
        let hash = block.hash();
        let previous = block.previous();
        let previous_balance = self.ledger.balance(self.txn.as_read(), &previous);

        BlockTable::del(self.txn, &hash)?;
        BlockTable::set_successor(self.txn, &previous, BlockHash::ZERO)?;
        FrontierTable::del(self.txn, &hash)?;
        FrontierTable::put(self.txn, &previous, account)?;
        AccountTable::put(
            self.txn,
            account,
            &AccountInfo {
                head: previous,
                rep_block,
                open_block: info.open_block,
                balance: previous_balance,
                modified: info.modified,
                block_count: info.block_count - 1,
            },
            epoch,
        )?;
        Ok(())
    }
}
