//! Staking Service
//!
//! Async facade over a single `Ledger`. Callers are serialized on one mutex
//! that is held for the whole transaction, including persistence. Each
//! operation is written as a single `LedgerCommit`; if that write fails the
//! ledger (and the local collaborators, when the service owns them) are
//! rolled back, so memory and store never diverge.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::common::error::{Result, ZStakeError};
use crate::common::logging::{generate_correlation_id, log_ledger_event, log_ledger_failure, log_security_event};
use crate::confidential::{ConfidentialSnapshot, DisclosureProof, LocalConfidentialService};
use crate::ledger::{
    AccrualParams, Checkpoint, ClaimReceipt, Clock, Collaborators, FinalizeReceipt, Ledger, LedgerError,
    StakeReceipt, WithdrawRequest,
};
use crate::storage::{LedgerCommit, LedgerStore, RegistrationChange, StorageError};
use crate::token::{ConfidentialRewardToken, NativeVault, TokenSnapshot, VaultSnapshot};
use crate::types::{AccountId, Handle, PositionState, StakeDetails, StakePosition};

/// In-process collaborators for simulation and tests
#[derive(Clone)]
pub struct LocalStack {
    pub confidential: Arc<LocalConfidentialService>,
    pub token: Arc<ConfidentialRewardToken>,
    pub vault: Arc<NativeVault>,
    pub clock: Arc<dyn Clock>,
}

/// Persisted form of a [`LocalStack`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStackSnapshot {
    pub confidential: ConfidentialSnapshot,
    pub token: TokenSnapshot,
    pub vault: VaultSnapshot,
}

impl LocalStackSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| StorageError::InvalidData(e.to_string()).into())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| StorageError::InvalidData(format!("collaborator state: {}", e)).into())
    }
}

impl LocalStack {
    /// Wire a fresh stack whose reward token only accepts `ledger_id` as minter
    pub fn new(ledger_id: AccountId, clock: Arc<dyn Clock>) -> Self {
        let confidential = Arc::new(LocalConfidentialService::new());
        let token = Arc::new(ConfidentialRewardToken::new(ledger_id, confidential.clone()));
        Self {
            confidential,
            token,
            vault: Arc::new(NativeVault::new()),
            clock,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            confidential: self.confidential.clone(),
            minter: self.token.clone(),
            vault: self.vault.clone(),
            clock: self.clock.clone(),
        }
    }

    pub fn ledger(&self, ledger_id: AccountId, params: AccrualParams) -> Ledger {
        Ledger::new(ledger_id, params, self.collaborators())
    }

    pub fn snapshot(&self) -> Result<LocalStackSnapshot> {
        Ok(LocalStackSnapshot {
            confidential: self.confidential.snapshot().map_err(LedgerError::from)?,
            token: self.token.snapshot().map_err(LedgerError::from)?,
            vault: self.vault.snapshot().map_err(LedgerError::from)?,
        })
    }

    /// Replace the state of every collaborator in place
    pub fn load(&self, snapshot: LocalStackSnapshot) -> Result<()> {
        self.confidential
            .load(snapshot.confidential)
            .map_err(LedgerError::from)?;
        self.token.load(snapshot.token).map_err(LedgerError::from)?;
        self.vault.load(snapshot.vault).map_err(LedgerError::from)?;
        Ok(())
    }

    /// Drop ciphertexts no position or token balance refers to; returns how many
    pub fn compact(&self, ledger: &Ledger) -> Result<usize> {
        let mut live: HashSet<Handle> = ledger
            .positions()
            .flat_map(|(_, position)| [position.confidential_amount(), position.state.pending_handle()])
            .flatten()
            .collect();
        let balances = self.token.snapshot().map_err(LedgerError::from)?.balances;
        live.extend(balances.into_iter().map(|(_, handle)| handle));

        let removed = self.confidential.retain(&live).map_err(LedgerError::from)?;
        if removed > 0 {
            tracing::debug!(target: "zstake::service", removed, live = live.len(), "pruned superseded ciphertexts");
        }
        Ok(removed)
    }
}

pub struct StakingService {
    ledger: Mutex<Ledger>,
    store: Arc<dyn LedgerStore>,
    /// Collaborators persisted alongside ledger state, when the service owns them
    local: Option<LocalStack>,
}

impl StakingService {
    /// Wrap an empty ledger; nothing is loaded from `store`
    pub fn new(ledger: Ledger, store: Arc<dyn LedgerStore>) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            store,
            local: None,
        }
    }

    /// Restore `ledger` from `store` and wrap it
    ///
    /// The ledger's collaborators must already hold the state its persisted
    /// handles refer to. Use [`StakingService::open_local`] for a `LocalStack`.
    pub async fn open(mut ledger: Ledger, store: Arc<dyn LedgerStore>) -> Result<Self> {
        Self::restore(&mut ledger, store.as_ref()).await?;
        Ok(Self::new(ledger, store))
    }

    /// Restore `stack` and a ledger wired to it from `store`
    ///
    /// Collaborator state is loaded into `stack` in place, so clones held by
    /// the caller see the restored values.
    pub async fn open_local(
        stack: LocalStack,
        ledger_id: AccountId,
        params: AccrualParams,
        store: Arc<dyn LedgerStore>,
    ) -> Result<Self> {
        if let Some(state) = store.load_collaborator_state().await? {
            stack.load(LocalStackSnapshot::from_json(&state)?)?;
        }

        let mut ledger = stack.ledger(ledger_id, params);
        Self::restore(&mut ledger, store.as_ref()).await?;

        Ok(Self {
            ledger: Mutex::new(ledger),
            store,
            local: Some(stack),
        })
    }

    async fn restore(ledger: &mut Ledger, store: &dyn LedgerStore) -> Result<()> {
        let positions = store.load_positions().await?;
        let registrations = store.load_registrations().await?;
        ledger.restore(positions, registrations)?;

        tracing::info!(
            target: "zstake::service",
            ledger = %ledger.id().short(),
            total_staked = %ledger.total_staked(),
            "staking service opened"
        );
        Ok(())
    }

    pub async fn stake(&self, account: AccountId, amount: u128) -> Result<StakeReceipt> {
        let correlation_id = generate_correlation_id();
        let mut ledger = self.ledger.lock().await;
        let (checkpoint, before) = self.begin(&ledger, &account)?;

        let receipt = ledger
            .stake(account, amount)
            .map_err(|e| Self::rejected("stake", &account, e, &correlation_id))?;

        self.persist(&mut ledger, checkpoint, before, RegistrationChange::Unchanged)
            .await?;
        Self::publish(&mut ledger, &correlation_id);
        Ok(receipt)
    }

    pub async fn claim_interest(&self, account: AccountId) -> Result<Option<ClaimReceipt>> {
        let correlation_id = generate_correlation_id();
        let mut ledger = self.ledger.lock().await;
        let (checkpoint, before) = self.begin(&ledger, &account)?;

        let receipt = ledger
            .claim_interest(account)
            .map_err(|e| Self::rejected("claim_interest", &account, e, &correlation_id))?;

        // A no-op claim still stamps the accrual clock of an existing position
        self.persist(&mut ledger, checkpoint, before, RegistrationChange::Unchanged)
            .await?;
        Self::publish(&mut ledger, &correlation_id);
        Ok(receipt)
    }

    pub async fn request_withdraw(&self, account: AccountId) -> Result<WithdrawRequest> {
        let correlation_id = generate_correlation_id();
        let mut ledger = self.ledger.lock().await;
        let (checkpoint, before) = self.begin(&ledger, &account)?;

        let request = ledger
            .request_withdraw(account)
            .map_err(|e| Self::rejected("request_withdraw", &account, e, &correlation_id))?;

        self.persist(&mut ledger, checkpoint, before, RegistrationChange::Insert(request.handle))
            .await?;
        Self::publish(&mut ledger, &correlation_id);
        Ok(request)
    }

    pub async fn finalize_withdraw(
        &self,
        handle: Handle,
        clear_amount: u64,
        proof: &DisclosureProof,
    ) -> Result<FinalizeReceipt> {
        let correlation_id = generate_correlation_id();
        let mut ledger = self.ledger.lock().await;
        let owner = ledger.registry().lookup(&handle);
        let before = self.local_snapshot()?;
        let checkpoint = owner.map(|owner| ledger.checkpoint(&owner));

        let receipt = match ledger.finalize_withdraw(handle, clear_amount, proof) {
            Ok(receipt) => receipt,
            Err(e) => {
                if e == LedgerError::InvalidProof {
                    log_security_event(
                        "disclosure_rejected",
                        false,
                        serde_json::json!({
                            "handle": handle.to_string(),
                            "clear_amount": clear_amount,
                        }),
                        Some(&correlation_id),
                    );
                }
                log_ledger_failure("finalize_withdraw", e.error_code(), &e.to_string(), &correlation_id);
                return Err(e.into());
            }
        };

        // Finalize only succeeds for registered handles, which always have an owner
        let checkpoint = checkpoint.ok_or_else(|| {
            LedgerError::InconsistentState(format!("finalized handle {} had no registered owner", handle))
        })?;
        self.persist(&mut ledger, checkpoint, before, RegistrationChange::Remove(handle))
            .await?;
        Self::publish(&mut ledger, &correlation_id);
        Ok(receipt)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn encrypted_stake(&self, account: &AccountId) -> Option<Handle> {
        self.ledger.lock().await.encrypted_stake(account)
    }

    pub async fn stake_details(&self, account: &AccountId) -> StakeDetails {
        self.ledger.lock().await.stake_details(account)
    }

    pub async fn pending_rewards(&self, account: &AccountId) -> Result<u128> {
        Ok(self.ledger.lock().await.pending_rewards(account)?)
    }

    pub async fn withdrawal_handle(&self, account: &AccountId) -> Option<Handle> {
        self.ledger.lock().await.withdrawal_handle(account)
    }

    pub async fn position_state(&self, account: &AccountId) -> PositionState {
        self.ledger.lock().await.position_state(account)
    }

    pub async fn total_staked(&self) -> u128 {
        self.ledger.lock().await.total_staked()
    }

    /// All positions, sorted by account
    pub async fn positions(&self) -> Vec<(AccountId, StakePosition)> {
        let ledger = self.ledger.lock().await;
        let mut positions: Vec<_> = ledger.positions().map(|(a, p)| (*a, p.clone())).collect();
        positions.sort_by_key(|(account, _)| *account);
        positions
    }

    pub async fn check_consistency(&self) -> Result<()> {
        Ok(self.ledger.lock().await.check_consistency()?)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn begin(&self, ledger: &Ledger, account: &AccountId) -> Result<(Checkpoint, Option<LocalStackSnapshot>)> {
        Ok((ledger.checkpoint(account), self.local_snapshot()?))
    }

    fn local_snapshot(&self) -> Result<Option<LocalStackSnapshot>> {
        self.local.as_ref().map(LocalStack::snapshot).transpose()
    }

    /// Write the checkpointed account's new state; roll everything back on failure
    async fn persist(
        &self,
        ledger: &mut Ledger,
        checkpoint: Checkpoint,
        before: Option<LocalStackSnapshot>,
        registration: RegistrationChange,
    ) -> Result<()> {
        let account = *checkpoint.account();
        // Claim on an unknown account creates nothing
        let Some(position) = ledger.position(&account).cloned() else {
            return Ok(());
        };

        let written = match self.collaborator_state(ledger) {
            Ok(state) => {
                let commit = LedgerCommit::new(account, position)
                    .with_registration(registration)
                    .with_collaborator_state(state);
                self.store.commit(&commit).await.map_err(ZStakeError::from)
            }
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            ledger.rollback(checkpoint);
            if let (Some(stack), Some(snapshot)) = (&self.local, before) {
                if let Err(restore) = stack.load(snapshot) {
                    tracing::error!(target: "zstake::service", error = %restore, "collaborator state not restored");
                }
            }
            tracing::error!(target: "zstake::service", account = %account.short(), error = %e, "commit not persisted");
            return Err(e);
        }
        Ok(())
    }

    fn collaborator_state(&self, ledger: &Ledger) -> Result<Option<String>> {
        let Some(stack) = &self.local else {
            return Ok(None);
        };
        stack.compact(ledger)?;
        Ok(Some(stack.snapshot()?.to_json()?))
    }

    fn publish(ledger: &mut Ledger, correlation_id: &str) {
        for event in ledger.drain_events() {
            log_ledger_event(&event, correlation_id);
        }
    }

    fn rejected(operation: &str, account: &AccountId, err: LedgerError, correlation_id: &str) -> ZStakeError {
        if err == LedgerError::UnauthorizedMinter {
            log_security_event(
                "unauthorized_mint",
                false,
                serde_json::json!({ "account": account.to_string() }),
                Some(correlation_id),
            );
        }
        log_ledger_failure(operation, err.error_code(), &err.to_string(), correlation_id);
        err.into()
    }
}
