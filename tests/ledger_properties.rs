//! End-to-end ledger behaviour against the in-process collaborators.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use zstake::confidential::ConfidentialError;
use zstake::token::TokenError;
use zstake::types::{SECONDS_PER_DAY, UNIT_SCALE};
use zstake::{
    AccountId, AccrualParams, DisclosureProof, Ledger, LedgerError, LocalStack, ManualClock, PositionState,
    RewardTokenMinter,
};

const RATE: u128 = 1_000_000;
const START: u64 = 1_700_000_000;

struct Env {
    ledger: Ledger,
    stack: LocalStack,
    clock: ManualClock,
}

fn ledger_id() -> AccountId {
    AccountId::from_label("zstake-ledger")
}

fn env() -> Env {
    let clock = ManualClock::new(START);
    let stack = LocalStack::new(ledger_id(), Arc::new(clock.clone()));
    let ledger = stack.ledger(ledger_id(), AccrualParams::new(RATE, UNIT_SCALE));
    Env { ledger, stack, clock }
}

fn account(name: &str) -> AccountId {
    AccountId::from_label(name)
}

impl Env {
    /// Request, disclose through the local oracle, and finalize
    fn withdraw_all(&mut self, who: AccountId) -> u64 {
        let request = self.ledger.request_withdraw(who).unwrap();
        let (values, proof) = self.stack.confidential.disclose(&[request.handle]).unwrap();
        self.ledger
            .finalize_withdraw(request.handle, values[0], &proof)
            .unwrap()
            .amount
    }
}

#[test]
fn one_unit_for_one_day_accrues_the_daily_rate() {
    let mut env = env();
    let alice = account("alice");

    env.ledger.stake(alice, UNIT_SCALE).unwrap();
    env.clock.advance(SECONDS_PER_DAY);

    assert_eq!(env.ledger.pending_rewards(&alice).unwrap(), 1_000_000);
}

#[test]
fn claim_with_nothing_owed_changes_nothing() {
    let mut env = env();
    let alice = account("alice");
    env.ledger.stake(alice, UNIT_SCALE).unwrap();
    let before = env.ledger.position(&alice).cloned();

    assert_eq!(env.ledger.claim_interest(alice).unwrap(), None);
    assert_eq!(env.ledger.position(&alice).cloned(), before);
    assert_eq!(env.stack.token.total_supply(), 0);
}

#[test]
fn claim_resets_and_pending_tracks_new_time_only() {
    let mut env = env();
    let alice = account("alice");
    env.ledger.stake(alice, UNIT_SCALE).unwrap();
    env.clock.advance(2 * SECONDS_PER_DAY);

    let claim = env.ledger.claim_interest(alice).unwrap().unwrap();
    assert_eq!(claim.amount, 2_000_000);
    assert_eq!(env.ledger.stake_details(&alice).accrued_rewards, 0);
    assert_eq!(
        env.stack.confidential.decrypt_for(&claim.balance_handle, &alice).unwrap(),
        2_000_000
    );

    env.clock.advance(SECONDS_PER_DAY / 4);
    assert_eq!(env.ledger.pending_rewards(&alice).unwrap(), 250_000);
}

#[test]
fn at_most_one_withdrawal_per_position() {
    let mut env = env();
    let alice = account("alice");
    env.ledger.stake(alice, 100).unwrap();

    let request = env.ledger.request_withdraw(alice).unwrap();
    assert_eq!(env.ledger.withdrawal_handle(&alice), Some(request.handle));

    assert_eq!(env.ledger.request_withdraw(alice), Err(LedgerError::WithdrawInProgress));
    assert_eq!(env.ledger.stake(alice, 1).map(|_| ()), Err(LedgerError::WithdrawInProgress));
    assert_eq!(
        env.ledger.position_state(&alice),
        PositionState::AwaitingDisclosure { handle: request.handle }
    );
}

#[test]
fn finalize_releases_exactly_the_disclosed_amount() {
    let mut env = env();
    let alice = account("alice");
    env.ledger.stake(alice, 700).unwrap();

    let request = env.ledger.request_withdraw(alice).unwrap();
    let (values, proof) = env.stack.confidential.disclose(&[request.handle]).unwrap();

    // Mismatched amount and unregistered handle both leave state untouched
    let before = env.ledger.position(&alice).cloned();
    assert_eq!(
        env.ledger.finalize_withdraw(request.handle, values[0] - 1, &proof),
        Err(LedgerError::InvalidProof)
    );
    let bob = account("bob");
    env.ledger.stake(bob, 5).unwrap();
    let unregistered = env.ledger.encrypted_stake(&bob).unwrap();
    assert_eq!(
        env.ledger.finalize_withdraw(unregistered, 5, &proof),
        Err(LedgerError::InvalidProof)
    );
    assert_eq!(env.ledger.position(&alice).cloned(), before);

    let receipt = env.ledger.finalize_withdraw(request.handle, values[0], &proof).unwrap();
    assert_eq!(receipt.amount, 700);
    assert_eq!(env.ledger.stake_details(&alice).plain_amount, 0);
    assert_eq!(env.ledger.withdrawal_handle(&alice), None);
    assert!(env.ledger.registry().is_empty());
    assert_eq!(env.stack.vault.released_to(&alice), 700);
}

#[test]
fn forged_proof_is_rejected() {
    let mut env = env();
    let alice = account("alice");
    env.ledger.stake(alice, 10).unwrap();
    let request = env.ledger.request_withdraw(alice).unwrap();

    let forged = DisclosureProof(vec![0xaa; 32]);
    assert_eq!(
        env.ledger.finalize_withdraw(request.handle, 10, &forged),
        Err(LedgerError::InvalidProof)
    );
    assert_eq!(env.stack.vault.stats().held, 10);
}

#[test]
fn base_asset_is_conserved_across_random_histories() {
    let mut env = env();
    let mut rng = StdRng::seed_from_u64(7);
    let accounts: Vec<AccountId> = (0..5).map(|i| account(&format!("user-{}", i))).collect();
    let mut withdrawn: u128 = 0;

    for _ in 0..200 {
        let who = accounts[rng.gen_range(0..accounts.len())];
        env.clock.advance(rng.gen_range(0..SECONDS_PER_DAY));

        if rng.gen_bool(0.75) || env.ledger.stake_details(&who).plain_amount == 0 {
            env.ledger.stake(who, rng.gen_range(1..1_000_000u128)).unwrap();
        } else {
            withdrawn += u128::from(env.withdraw_all(who));
        }

        let stats = env.stack.vault.stats();
        assert_eq!(stats.held, env.ledger.total_staked());
        assert_eq!(stats.held, stats.total_deposited - withdrawn);
        env.ledger.check_consistency().unwrap();
    }
}

#[test]
fn split_settlement_never_pays_more() {
    // Exact day multiples on whole units divide evenly
    let mut whole = env();
    let alice = account("alice");
    whole.ledger.stake(alice, UNIT_SCALE).unwrap();
    whole.clock.advance(SECONDS_PER_DAY);
    let first = whole.ledger.claim_interest(alice).unwrap().unwrap().amount;
    whole.clock.advance(SECONDS_PER_DAY);
    let second = whole.ledger.claim_interest(alice).unwrap().unwrap().amount;

    let mut once = env();
    once.ledger.stake(alice, UNIT_SCALE).unwrap();
    once.clock.advance(2 * SECONDS_PER_DAY);
    let single = once.ledger.claim_interest(alice).unwrap().unwrap().amount;
    assert_eq!(first + second, single);

    // Odd principal over an odd span truncates in each half
    let amount = UNIT_SCALE / 3;
    let span = 3 * SECONDS_PER_DAY + 1;

    let mut split = env();
    split.ledger.stake(alice, amount).unwrap();
    split.clock.advance(span / 2);
    let a = split.ledger.claim_interest(alice).unwrap().map_or(0, |c| c.amount);
    split.clock.advance(span - span / 2);
    let b = split.ledger.claim_interest(alice).unwrap().map_or(0, |c| c.amount);

    let mut full = env();
    full.ledger.stake(alice, amount).unwrap();
    full.clock.advance(span);
    let c = full.ledger.claim_interest(alice).unwrap().map_or(0, |c| c.amount);

    assert!(a + b <= c);
}

#[test]
fn only_the_ledger_can_mint_rewards() {
    let env = env();
    let mallory = account("mallory");

    let result = env.stack.token.mint(&mallory, &mallory, 1_000);
    assert!(matches!(result, Err(TokenError::UnauthorizedMinter(caller)) if caller == mallory));
    assert_eq!(env.stack.token.total_supply(), 0);
}

#[test]
fn principal_is_private_to_its_owner() {
    let mut env = env();
    let alice = account("alice");
    env.ledger.stake(alice, 42).unwrap();
    let handle = env.ledger.encrypted_stake(&alice).unwrap();

    assert_eq!(env.stack.confidential.decrypt_for(&handle, &alice).unwrap(), 42);
    assert!(matches!(
        env.stack.confidential.decrypt_for(&handle, &account("eve")),
        Err(ConfidentialError::AccessDenied { .. })
    ));
    assert!(matches!(
        env.stack.confidential.disclose(&[handle]),
        Err(ConfidentialError::NotDisclosable(_))
    ));
}
