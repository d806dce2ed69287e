//! Block application rules, variant by variant.

mod common;

use almond_blocks::{Block, ChangeBlock, OpenBlock, ReceiveBlock, SendBlock, StateBlock};
use almond_crypto::KeyPair;
use almond_ledger::ProcessResult;
use almond_store::Store;
use almond_types::{Account, Amount, BlockHash, Signature};
use common::Fixture;

fn send_from_genesis(fixture: &Fixture, destination: Account, amount: u128) -> Block {
    let txn = fixture.store.tx_begin_read().unwrap();
    let head = fixture
        .ledger
        .latest(txn.as_ref(), &fixture.genesis_account())
        .unwrap();
    let balance = fixture.balance(&fixture.genesis_account());
    Block::Send(SendBlock::new(
        head,
        destination,
        balance.checked_sub(Amount::raw(amount)).unwrap(),
        &fixture.genesis_key.secret,
        0,
    ))
}

#[test]
fn genesis_holds_entire_supply() {
    let fixture = Fixture::new();
    let genesis = fixture.genesis_account();
    assert_eq!(fixture.balance(&genesis), Amount::MAX);
    assert_eq!(fixture.weight(&genesis), Amount::MAX);
    assert_eq!(fixture.circulating_total(), Amount::MAX);
}

#[test]
fn send_progress_creates_pending() {
    let fixture = Fixture::new();
    let key = KeyPair::generate();
    let send = send_from_genesis(&fixture, key.public, 100);

    let result = fixture.process_return(&send);
    assert_eq!(result.code, ProcessResult::Progress);
    assert_eq!(result.account, fixture.genesis_account());
    assert_eq!(result.amount, Amount::raw(100));
    assert_eq!(result.pending_account, key.public);

    assert_eq!(
        fixture.weight(&fixture.genesis_account()),
        Amount::MAX.checked_sub(Amount::raw(100)).unwrap()
    );
    assert_eq!(fixture.circulating_total(), Amount::MAX);
}

#[test]
fn duplicate_send_is_old() {
    let fixture = Fixture::new();
    let send = send_from_genesis(&fixture, KeyPair::generate().public, 100);
    assert_eq!(fixture.process(&send), ProcessResult::Progress);
    assert_eq!(fixture.process(&send), ProcessResult::Old);
}

#[test]
fn bad_send_signature() {
    let fixture = Fixture::new();
    let mut send = send_from_genesis(&fixture, KeyPair::generate().public, 100);
    let mut bytes = *send.signature().as_bytes();
    bytes[17] ^= 0x04;
    send.set_signature(Signature(bytes));
    assert_eq!(fixture.process(&send), ProcessResult::BadSignature);
}

#[test]
fn unknown_previous_is_gap() {
    let fixture = Fixture::new();
    let send = Block::Send(SendBlock::new(
        BlockHash::new([0xEE; 32]),
        KeyPair::generate().public,
        Amount::ZERO,
        &fixture.genesis_key.secret,
        0,
    ));
    assert_eq!(fixture.process(&send), ProcessResult::GapPrevious);
}

#[test]
fn second_block_on_same_previous_is_fork() {
    let fixture = Fixture::new();
    let send1 = send_from_genesis(&fixture, KeyPair::generate().public, 100);
    assert_eq!(fixture.process(&send1), ProcessResult::Progress);

    // Same previous, different destination: competes for the same slot.
    let genesis_hash = fixture.ledger.constants.genesis.hash();
    let send2 = Block::Send(SendBlock::new(
        genesis_hash,
        KeyPair::generate().public,
        Amount::MAX.checked_sub(Amount::raw(200)).unwrap(),
        &fixture.genesis_key.secret,
        0,
    ));
    assert_eq!(fixture.process(&send2), ProcessResult::Fork);
}

#[test]
fn balance_increase_in_send_is_negative_spend() {
    let fixture = Fixture::new();
    let key = KeyPair::generate();
    let send = send_from_genesis(&fixture, key.public, 100);
    assert_eq!(fixture.process(&send), ProcessResult::Progress);

    // A "send" that raises the balance above the current head's.
    let bad = Block::Send(SendBlock::new(
        send.hash(),
        key.public,
        Amount::MAX,
        &fixture.genesis_key.secret,
        0,
    ));
    assert_eq!(fixture.process(&bad), ProcessResult::NegativeSpend);
}

#[test]
fn open_receives_the_send() {
    let fixture = Fixture::new();
    let key = KeyPair::generate();
    let representative = KeyPair::generate().public;
    let send = send_from_genesis(&fixture, key.public, 250);
    assert_eq!(fixture.process(&send), ProcessResult::Progress);

    let open = Block::Open(OpenBlock::new(
        send.hash(),
        representative,
        key.public,
        &key.secret,
        0,
    ));
    assert_eq!(fixture.process(&open), ProcessResult::Progress);
    assert_eq!(fixture.balance(&key.public), Amount::raw(250));
    assert_eq!(fixture.weight(&representative), Amount::raw(250));
    assert_eq!(fixture.circulating_total(), Amount::MAX);
}

#[test]
fn open_without_source_is_gap_source() {
    let fixture = Fixture::new();
    let key = KeyPair::generate();
    let open = Block::Open(OpenBlock::new(
        BlockHash::new([0xCD; 32]),
        key.public,
        key.public,
        &key.secret,
        0,
    ));
    assert_eq!(fixture.process(&open), ProcessResult::GapSource);
}

#[test]
fn receive_already_pocketed_source_is_unreceivable() {
    let fixture = Fixture::new();
    let key = KeyPair::generate();
    let send1 = send_from_genesis(&fixture, key.public, 100);
    assert_eq!(fixture.process(&send1), ProcessResult::Progress);
    let send2 = send_from_genesis(&fixture, key.public, 100);
    assert_eq!(fixture.process(&send2), ProcessResult::Progress);

    let open = Block::Open(OpenBlock::new(
        send1.hash(),
        key.public,
        key.public,
        &key.secret,
        0,
    ));
    assert_eq!(fixture.process(&open), ProcessResult::Progress);

    let receive = Block::Receive(ReceiveBlock::new(open.hash(), send2.hash(), &key.secret, 0));
    assert_eq!(fixture.process(&receive), ProcessResult::Progress);
    assert_eq!(fixture.balance(&key.public), Amount::raw(200));

    // Pocketing the same send again.
    let again = Block::Receive(ReceiveBlock::new(
        receive.hash(),
        send2.hash(),
        &key.secret,
        0,
    ));
    assert_eq!(fixture.process(&again), ProcessResult::Unreceivable);
}

#[test]
fn opening_the_burn_account_is_rejected() {
    let fixture = Fixture::new();
    let send = send_from_genesis(&fixture, Account::ZERO, 100);
    assert_eq!(fixture.process(&send), ProcessResult::Progress);

    // Nobody holds the burn key; feed the block through the pre-verified
    // path to reach the burn check itself.
    let open = Block::Open(OpenBlock {
        source: send.hash(),
        representative: Account::ZERO,
        account: Account::ZERO,
        signature: Signature([1u8; 64]),
        work: 0,
    });
    assert_eq!(fixture.process_verified(&open), ProcessResult::OpenedBurnAccount);
}

#[test]
fn change_moves_weight() {
    let fixture = Fixture::new();
    let genesis = fixture.genesis_account();
    let new_rep = KeyPair::generate().public;
    let genesis_hash = fixture.ledger.constants.genesis.hash();

    let change = Block::Change(ChangeBlock::new(
        genesis_hash,
        new_rep,
        &fixture.genesis_key.secret,
        0,
    ));
    assert_eq!(fixture.process(&change), ProcessResult::Progress);
    assert_eq!(fixture.weight(&genesis), Amount::ZERO);
    assert_eq!(fixture.weight(&new_rep), Amount::MAX);
    assert_eq!(fixture.circulating_total(), Amount::MAX);
}

#[test]
fn state_send_and_receive() {
    let fixture = Fixture::new();
    let genesis = fixture.genesis_account();
    let key = KeyPair::generate();
    let genesis_hash = fixture.ledger.constants.genesis.hash();

    let state_send = Block::State(StateBlock::new(
        genesis,
        genesis_hash,
        genesis,
        Amount::MAX.checked_sub(Amount::raw(500)).unwrap(),
        key.public.into(),
        &fixture.genesis_key.secret,
        0,
    ));
    let result = fixture.process_return(&state_send);
    assert_eq!(result.code, ProcessResult::Progress);
    assert_eq!(result.state_is_send, Some(true));
    assert_eq!(result.amount, Amount::raw(500));

    // State open on the destination: previous zero, link names the send.
    let state_open = Block::State(StateBlock::new(
        key.public,
        BlockHash::ZERO,
        key.public,
        Amount::raw(500),
        state_send.hash(),
        &key.secret,
        0,
    ));
    let result = fixture.process_return(&state_open);
    assert_eq!(result.code, ProcessResult::Progress);
    assert_eq!(result.state_is_send, Some(false));
    assert_eq!(fixture.balance(&key.public), Amount::raw(500));
    assert_eq!(fixture.weight(&key.public), Amount::raw(500));
    assert_eq!(fixture.circulating_total(), Amount::MAX);
}

#[test]
fn state_receive_with_wrong_amount_is_balance_mismatch() {
    let fixture = Fixture::new();
    let genesis = fixture.genesis_account();
    let key = KeyPair::generate();
    let genesis_hash = fixture.ledger.constants.genesis.hash();

    let state_send = Block::State(StateBlock::new(
        genesis,
        genesis_hash,
        genesis,
        Amount::MAX.checked_sub(Amount::raw(500)).unwrap(),
        key.public.into(),
        &fixture.genesis_key.secret,
        0,
    ));
    assert_eq!(fixture.process(&state_send), ProcessResult::Progress);

    // Claims 600 where the send carried 500.
    let state_open = Block::State(StateBlock::new(
        key.public,
        BlockHash::ZERO,
        key.public,
        Amount::raw(600),
        state_send.hash(),
        &key.secret,
        0,
    ));
    assert_eq!(fixture.process(&state_open), ProcessResult::BalanceMismatch);
}

#[test]
fn state_change_of_representative_only() {
    let fixture = Fixture::new();
    let genesis = fixture.genesis_account();
    let new_rep = KeyPair::generate().public;
    let genesis_hash = fixture.ledger.constants.genesis.hash();

    let state_change = Block::State(StateBlock::new(
        genesis,
        genesis_hash,
        new_rep,
        Amount::MAX,
        BlockHash::ZERO,
        &fixture.genesis_key.secret,
        0,
    ));
    let result = fixture.process_return(&state_change);
    assert_eq!(result.code, ProcessResult::Progress);
    assert_eq!(result.state_is_send, Some(false));
    assert_eq!(result.amount, Amount::ZERO);
    assert_eq!(fixture.weight(&new_rep), Amount::MAX);
    assert_eq!(fixture.weight(&genesis), Amount::ZERO);
}

#[test]
fn legacy_block_after_state_head_is_block_position() {
    let fixture = Fixture::new();
    let genesis = fixture.genesis_account();
    let genesis_hash = fixture.ledger.constants.genesis.hash();

    let state_change = Block::State(StateBlock::new(
        genesis,
        genesis_hash,
        genesis,
        Amount::MAX,
        BlockHash::ZERO,
        &fixture.genesis_key.secret,
        0,
    ));
    assert_eq!(fixture.process(&state_change), ProcessResult::Progress);

    let send = Block::Send(SendBlock::new(
        state_change.hash(),
        KeyPair::generate().public,
        Amount::MAX.checked_sub(Amount::raw(1)).unwrap(),
        &fixture.genesis_key.secret,
        0,
    ));
    assert_eq!(fixture.process(&send), ProcessResult::BlockPosition);
}

#[test]
fn epoch_upgrade_marks_the_account() {
    let fixture = Fixture::new();
    let genesis = fixture.genesis_account();
    let genesis_hash = fixture.ledger.constants.genesis.hash();
    let epoch_link = fixture.ledger.constants.epoch_link;

    // Epoch blocks are signed by the epoch signer (genesis here), keep the
    // balance and representative, and carry the epoch link.
    let epoch = Block::State(StateBlock::new(
        genesis,
        genesis_hash,
        genesis,
        Amount::MAX,
        epoch_link,
        &fixture.genesis_key.secret,
        0,
    ));
    assert_eq!(fixture.process(&epoch), ProcessResult::Progress);

    // A second upgrade cannot follow.
    let epoch2 = Block::State(StateBlock::new(
        genesis,
        epoch.hash(),
        genesis,
        Amount::MAX,
        epoch_link,
        &fixture.genesis_key.secret,
        0,
    ));
    assert_eq!(fixture.process(&epoch2), ProcessResult::BlockPosition);
}

#[test]
fn epoch_with_balance_change_is_balance_mismatch() {
    let fixture = Fixture::new();
    let genesis = fixture.genesis_account();
    let genesis_hash = fixture.ledger.constants.genesis.hash();
    let epoch_link = fixture.ledger.constants.epoch_link;

    let epoch = Block::State(StateBlock::new(
        genesis,
        genesis_hash,
        genesis,
        Amount::MAX.checked_sub(Amount::raw(1)).unwrap(),
        epoch_link,
        &fixture.genesis_key.secret,
        0,
    ));
    assert_eq!(fixture.process(&epoch), ProcessResult::BalanceMismatch);
}

#[test]
fn epoch_with_representative_change_is_representative_mismatch() {
    let fixture = Fixture::new();
    let genesis = fixture.genesis_account();
    let genesis_hash = fixture.ledger.constants.genesis.hash();
    let epoch_link = fixture.ledger.constants.epoch_link;

    let epoch = Block::State(StateBlock::new(
        genesis,
        genesis_hash,
        KeyPair::generate().public,
        Amount::MAX,
        epoch_link,
        &fixture.genesis_key.secret,
        0,
    ));
    assert_eq!(
        fixture.process(&epoch),
        ProcessResult::RepresentativeMismatch
    );
}

#[test]
fn legacy_receive_of_epoch1_pending_is_unreceivable() {
    let fixture = Fixture::new();
    let genesis = fixture.genesis_account();
    let key = KeyPair::generate();
    let genesis_hash = fixture.ledger.constants.genesis.hash();
    let epoch_link = fixture.ledger.constants.epoch_link;

    let epoch = Block::State(StateBlock::new(
        genesis,
        genesis_hash,
        genesis,
        Amount::MAX,
        epoch_link,
        &fixture.genesis_key.secret,
        0,
    ));
    assert_eq!(fixture.process(&epoch), ProcessResult::Progress);

    // A send from the upgraded account creates an epoch-1 pending entry.
    let send = Block::State(StateBlock::new(
        genesis,
        epoch.hash(),
        genesis,
        Amount::MAX.checked_sub(Amount::raw(42)).unwrap(),
        key.public.into(),
        &fixture.genesis_key.secret,
        0,
    ));
    assert_eq!(fixture.process(&send), ProcessResult::Progress);

    // A legacy open cannot pocket it; a state block is required.
    let open = Block::Open(OpenBlock::new(
        send.hash(),
        key.public,
        key.public,
        &key.secret,
        0,
    ));
    assert_eq!(fixture.process(&open), ProcessResult::Unreceivable);
}
