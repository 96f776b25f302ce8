//! Staking Ledger
//!
//! Owns every stake position and the withdrawal registry, and drives the
//! per-position state machine:
//!
//! ```text
//! stake ──▶ Active ──request_withdraw──▶ AwaitingDisclosure
//!             ▲                                  │
//!             └───────── finalize_withdraw ──────┘  (principal reset to zero)
//! ```
//!
//! Every mutating entry point settles accrual first, runs all local checks,
//! performs its external calls, and only then commits. The reward mint in
//! `claim_interest` and the base-asset release in `finalize_withdraw` run
//! after commit and restore the previous state if they fail.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::accrual::{self, AccrualParams};
use super::clock::Clock;
use super::error::LedgerError;
use super::registry::WithdrawalRegistry;
use crate::confidential::{encode_clear_values, ConfidentialValueService, DisclosureProof};
use crate::token::{BaseAssetVault, RewardTokenMinter};
use crate::types::{AccountId, Handle, LedgerEvent, PositionState, StakeDetails, StakePosition};

/// External collaborators of the ledger
#[derive(Clone)]
pub struct Collaborators {
    pub confidential: Arc<dyn ConfidentialValueService>,
    pub minter: Arc<dyn RewardTokenMinter>,
    pub vault: Arc<dyn BaseAssetVault>,
    pub clock: Arc<dyn Clock>,
}

/// Result of a committed stake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StakeReceipt {
    pub account: AccountId,
    pub handle: Handle,
    pub plain_amount: u64,
}

/// Result of a claim that minted rewards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClaimReceipt {
    pub account: AccountId,
    pub amount: u64,
    pub balance_handle: Handle,
}

/// Registered withdrawal awaiting disclosure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WithdrawRequest {
    pub account: AccountId,
    pub handle: Handle,
    pub plain_amount: u64,
}

/// Completed withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FinalizeReceipt {
    pub account: AccountId,
    pub handle: Handle,
    pub amount: u64,
}

/// State of one account captured before an operation, for [`Ledger::rollback`]
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    account: AccountId,
    position: Option<StakePosition>,
    registration: Option<Handle>,
    events: usize,
}

impl Checkpoint {
    pub fn account(&self) -> &AccountId {
        &self.account
    }
}

pub struct Ledger {
    /// Principal the ledger acts as when calling the minter
    id: AccountId,
    params: AccrualParams,
    positions: HashMap<AccountId, StakePosition>,
    registry: WithdrawalRegistry,
    deps: Collaborators,
    events: Vec<LedgerEvent>,
}

impl Ledger {
    pub fn new(id: AccountId, params: AccrualParams, deps: Collaborators) -> Self {
        Self {
            id,
            params,
            positions: HashMap::new(),
            registry: WithdrawalRegistry::new(),
            deps,
            events: Vec::new(),
        }
    }

    /// Replace in-memory state with a persisted snapshot
    ///
    /// Rejects snapshots where a registration and its owner's position disagree.
    pub fn restore(
        &mut self,
        positions: Vec<(AccountId, StakePosition)>,
        registrations: Vec<(Handle, AccountId)>,
    ) -> Result<(), LedgerError> {
        let mut registry = WithdrawalRegistry::new();
        for (handle, owner) in registrations {
            registry
                .insert(handle, owner)
                .map_err(|_| LedgerError::InconsistentState(format!("duplicate registration {}", handle)))?;
        }

        let positions: HashMap<_, _> = positions.into_iter().collect();
        check_consistency(&positions, &registry)?;

        self.positions = positions;
        self.registry = registry;
        tracing::info!(
            target: "zstake::ledger",
            positions = self.positions.len(),
            pending_withdrawals = self.registry.len(),
            "ledger state restored"
        );
        Ok(())
    }

    /// Capture `account`'s position, its registration and the event cursor
    pub fn checkpoint(&self, account: &AccountId) -> Checkpoint {
        Checkpoint {
            account: *account,
            position: self.positions.get(account).cloned(),
            registration: self.withdrawal_handle(account),
            events: self.events.len(),
        }
    }

    /// Undo every change made to the checkpoint's account since it was taken
    ///
    /// Used when a committed operation could not be persisted. Collaborator
    /// side effects are not reverted here.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        let Checkpoint {
            account,
            position,
            registration,
            events,
        } = checkpoint;

        if let Some(current) = self.withdrawal_handle(&account) {
            self.registry.remove(&current);
        }
        if let Some(handle) = registration {
            if let Err(e) = self.registry.insert(handle, account) {
                tracing::error!(target: "zstake::ledger", account = %account.short(), %handle, error = %e, "registration not restored");
            }
        }
        match position {
            Some(position) => self.positions.insert(account, position),
            None => self.positions.remove(&account),
        };
        self.events.truncate(events);

        tracing::warn!(target: "zstake::ledger", account = %account.short(), "operation rolled back");
    }

    // ------------------------------------------------------------------
    // Mutating operations
    // ------------------------------------------------------------------

    /// Deposit `amount` base units into `account`'s confidential principal
    pub fn stake(&mut self, account: AccountId, amount: u128) -> Result<StakeReceipt, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::NoStake);
        }
        let amount = u64::try_from(amount).map_err(|_| LedgerError::RewardTooLarge)?;

        let mut position = self.positions.get(&account).cloned().unwrap_or_default();
        if self.withdrawal_pending(&position) {
            return Err(LedgerError::WithdrawInProgress);
        }
        let new_clear = position
            .plain_amount()
            .checked_add(amount)
            .ok_or(LedgerError::RewardTooLarge)?;

        let now = self.deps.clock.now();
        accrual::settle(&mut position, &self.params, now)?;

        let confidential = &self.deps.confidential;
        let current = match position.confidential_amount() {
            Some(handle) => handle,
            None => confidential.zero()?,
        };
        let deposit = confidential.from_clear(amount)?;
        let updated = confidential.add(&current, &deposit)?;
        confidential.grant_access(&updated, &account)?;
        self.deps.vault.deposit(&account, amount)?;

        position.principal.set(updated, new_clear);
        self.positions.insert(account, position);

        tracing::info!(target: "zstake::ledger", account = %account.short(), handle = %updated, "stake committed");
        self.events.push(LedgerEvent::Staked {
            account,
            handle: updated,
            timestamp: now,
        });

        Ok(StakeReceipt {
            account,
            handle: updated,
            plain_amount: new_clear,
        })
    }

    /// Mint all owed rewards to `account`
    ///
    /// Returns `Ok(None)` when nothing is owed; that is not an error.
    pub fn claim_interest(&mut self, account: AccountId) -> Result<Option<ClaimReceipt>, LedgerError> {
        let Some(previous) = self.positions.get(&account).cloned() else {
            return Ok(None);
        };

        let now = self.deps.clock.now();
        let mut position = previous.clone();
        accrual::settle(&mut position, &self.params, now)?;

        if position.accrued_rewards == 0 {
            self.positions.insert(account, position);
            return Ok(None);
        }
        let amount = u64::try_from(position.accrued_rewards).map_err(|_| LedgerError::RewardTooLarge)?;

        // Zero before minting so a re-entrant mint cannot claim twice
        position.accrued_rewards = 0;
        self.positions.insert(account, position);

        let balance_handle = match self.deps.minter.mint(&self.id, &account, amount) {
            Ok(handle) => handle,
            Err(e) => {
                self.positions.insert(account, previous);
                tracing::warn!(target: "zstake::ledger", account = %account.short(), error = %e, "reward mint failed");
                return Err(e.into());
            }
        };

        tracing::info!(target: "zstake::ledger", account = %account.short(), amount, "interest claimed");
        self.events.push(LedgerEvent::InterestClaimed {
            account,
            amount,
            balance_handle,
            timestamp: now,
        });

        Ok(Some(ClaimReceipt {
            account,
            amount,
            balance_handle,
        }))
    }

    /// Settle accrual, register the principal handle and mark it disclosable
    pub fn request_withdraw(&mut self, account: AccountId) -> Result<WithdrawRequest, LedgerError> {
        let mut position = self.positions.get(&account).cloned().unwrap_or_default();
        if position.principal.is_empty() {
            return Err(LedgerError::NoStake);
        }
        let handle = position.confidential_amount().ok_or_else(|| {
            LedgerError::InconsistentState(format!("{} has principal without handle", account))
        })?;
        if self.withdrawal_pending(&position) {
            return Err(LedgerError::WithdrawInProgress);
        }

        let now = self.deps.clock.now();
        accrual::settle(&mut position, &self.params, now)?;

        self.deps.confidential.make_disclosable(&handle)?;

        self.registry.insert(handle, account)?;
        position.state = PositionState::AwaitingDisclosure { handle };
        let plain_amount = position.plain_amount();
        self.positions.insert(account, position);

        tracing::info!(target: "zstake::ledger", account = %account.short(), %handle, plain_amount, "withdrawal requested");
        self.events.push(LedgerEvent::WithdrawRequested {
            account,
            handle,
            plain_amount,
            timestamp: now,
        });

        Ok(WithdrawRequest {
            account,
            handle,
            plain_amount,
        })
    }

    /// Consume a disclosure proof and release the principal to its owner
    pub fn finalize_withdraw(
        &mut self,
        handle: Handle,
        clear_amount: u64,
        proof: &DisclosureProof,
    ) -> Result<FinalizeReceipt, LedgerError> {
        let owner = self.registry.lookup(&handle).ok_or(LedgerError::InvalidProof)?;
        let previous = self.positions.get(&owner).cloned().ok_or(LedgerError::InvalidProof)?;

        let bound = previous.confidential_amount() == Some(handle)
            && previous.state.pending_handle() == Some(handle);
        if !bound || previous.plain_amount() != clear_amount {
            tracing::warn!(target: "zstake::ledger", %handle, clear_amount, "stale or mismatched finalize");
            return Err(LedgerError::InvalidProof);
        }

        self.deps
            .confidential
            .verify_disclosure(&[handle], &encode_clear_values(&[clear_amount]), proof)
            .map_err(|e| {
                tracing::warn!(target: "zstake::ledger", %handle, error = %e, "disclosure rejected");
                LedgerError::InvalidProof
            })?;

        let zero = self.deps.confidential.zero()?;
        self.deps.confidential.grant_access(&zero, &owner)?;

        let now = self.deps.clock.now();
        let mut position = previous.clone();
        position.principal.set(zero, 0);
        position.last_accrual_time = previous.last_accrual_time.max(now);
        position.state = PositionState::Active;

        self.positions.insert(owner, position);
        self.registry.remove(&handle);

        // Release last; on failure nothing above persists
        if let Err(e) = self.deps.vault.release(&owner, clear_amount) {
            self.positions.insert(owner, previous);
            self.registry.insert(handle, owner)?;
            tracing::error!(target: "zstake::ledger", account = %owner.short(), error = %e, "base asset release failed");
            return Err(e.into());
        }

        tracing::info!(target: "zstake::ledger", account = %owner.short(), %handle, clear_amount, "withdrawal finalized");
        self.events.push(LedgerEvent::WithdrawFinalized {
            account: owner,
            handle,
            amount: clear_amount,
            timestamp: now,
        });

        Ok(FinalizeReceipt {
            account: owner,
            handle,
            amount: clear_amount,
        })
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn params(&self) -> &AccrualParams {
        &self.params
    }

    pub fn encrypted_stake(&self, account: &AccountId) -> Option<Handle> {
        self.positions.get(account).and_then(|p| p.confidential_amount())
    }

    pub fn stake_details(&self, account: &AccountId) -> StakeDetails {
        self.positions.get(account).map(|p| p.details()).unwrap_or_default()
    }

    /// Owed rewards plus the projection up to now, without settling
    pub fn pending_rewards(&self, account: &AccountId) -> Result<u128, LedgerError> {
        match self.positions.get(account) {
            Some(position) => accrual::pending(position, &self.params, self.deps.clock.now()),
            None => Ok(0),
        }
    }

    /// Handle registered for withdrawal, if one is pending
    pub fn withdrawal_handle(&self, account: &AccountId) -> Option<Handle> {
        self.positions
            .get(account)
            .and_then(|p| p.state.pending_handle())
            .filter(|h| self.registry.lookup(h) == Some(*account))
    }

    pub fn position(&self, account: &AccountId) -> Option<&StakePosition> {
        self.positions.get(account)
    }

    pub fn position_state(&self, account: &AccountId) -> PositionState {
        self.positions.get(account).map(|p| p.state).unwrap_or_default()
    }

    pub fn positions(&self) -> impl Iterator<Item = (&AccountId, &StakePosition)> {
        self.positions.iter()
    }

    pub fn registry(&self) -> &WithdrawalRegistry {
        &self.registry
    }

    /// Sum of all clear principals
    pub fn total_staked(&self) -> u128 {
        self.positions.values().map(|p| p.plain_amount() as u128).sum()
    }

    /// Take emitted events in commit order
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Verify registry and position states agree
    pub fn check_consistency(&self) -> Result<(), LedgerError> {
        check_consistency(&self.positions, &self.registry)
    }

    fn withdrawal_pending(&self, position: &StakePosition) -> bool {
        position.state.is_awaiting()
            || position
                .confidential_amount()
                .is_some_and(|h| self.registry.contains(&h))
    }
}

fn check_consistency(
    positions: &HashMap<AccountId, StakePosition>,
    registry: &WithdrawalRegistry,
) -> Result<(), LedgerError> {
    for (handle, owner) in registry.iter() {
        let position = positions
            .get(owner)
            .ok_or_else(|| LedgerError::InconsistentState(format!("registration {} has no position", handle)))?;
        if position.state.pending_handle() != Some(*handle) || position.confidential_amount() != Some(*handle) {
            return Err(LedgerError::InconsistentState(format!(
                "registration {} does not match position of {}",
                handle, owner
            )));
        }
    }

    for (account, position) in positions {
        if !position.principal.is_empty() && position.confidential_amount().is_none() {
            return Err(LedgerError::InconsistentState(format!("{} principal mirror mismatch", account)));
        }
        if let Some(handle) = position.state.pending_handle() {
            if registry.lookup(&handle) != Some(*account) {
                return Err(LedgerError::InconsistentState(format!(
                    "{} awaits disclosure of unregistered handle {}",
                    account, handle
                )));
            }
        }
    }
    Ok(())
}
