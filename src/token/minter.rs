//! Reward Token Minter
//!
//! Confidential yield asset. Only the single authorized minter (the ledger)
//! may create new units; balances are confidential handles readable by the
//! holder.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::confidential::{ConfidentialError, ConfidentialValueService};
use crate::types::{AccountId, Handle};

/// Reward token errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("unauthorized minter: {0}")]
    UnauthorizedMinter(AccountId),

    #[error("total supply overflow")]
    SupplyOverflow,

    #[error("confidential service error: {0}")]
    Confidential(#[from] ConfidentialError),

    #[error("token state unavailable: {0}")]
    Unavailable(String),
}

/// Mint entry point the ledger depends on
#[cfg_attr(test, mockall::automock)]
pub trait RewardTokenMinter: Send + Sync {
    /// Mint `amount` clear units to `to`; returns the recipient's new confidential balance
    fn mint(&self, caller: &AccountId, to: &AccountId, amount: u64) -> Result<Handle, TokenError>;
}

/// Balances and supply, sorted by account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub balances: Vec<(AccountId, Handle)>,
    pub total_supply: u64,
}

#[derive(Default)]
struct Balances {
    balances: HashMap<AccountId, Handle>,
    total_supply: u64,
}

/// Confidential reward token with a fixed minter
pub struct ConfidentialRewardToken {
    /// Set once at construction
    minter: AccountId,
    confidential: Arc<dyn ConfidentialValueService>,
    state: RwLock<Balances>,
}

impl ConfidentialRewardToken {
    pub fn new(minter: AccountId, confidential: Arc<dyn ConfidentialValueService>) -> Self {
        Self {
            minter,
            confidential,
            state: RwLock::new(Balances::default()),
        }
    }

    pub fn minter(&self) -> &AccountId {
        &self.minter
    }

    /// Confidential balance handle of `account`, if it ever received units
    pub fn confidential_balance_of(&self, account: &AccountId) -> Option<Handle> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.balances.get(account).copied())
    }

    /// Clear total supply (sum of all minted units)
    pub fn total_supply(&self) -> u64 {
        self.state.read().map(|state| state.total_supply).unwrap_or(0)
    }

    pub fn snapshot(&self) -> Result<TokenSnapshot, TokenError> {
        let state = self
            .state
            .read()
            .map_err(|_| TokenError::Unavailable("lock poisoned".to_string()))?;
        let mut balances: Vec<(AccountId, Handle)> =
            state.balances.iter().map(|(account, handle)| (*account, *handle)).collect();
        balances.sort();
        Ok(TokenSnapshot {
            balances,
            total_supply: state.total_supply,
        })
    }

    /// Replace balances and supply; the minter is fixed and not part of the snapshot
    pub fn load(&self, snapshot: TokenSnapshot) -> Result<(), TokenError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| TokenError::Unavailable("lock poisoned".to_string()))?;
        *state = Balances {
            balances: snapshot.balances.into_iter().collect(),
            total_supply: snapshot.total_supply,
        };
        Ok(())
    }
}

impl RewardTokenMinter for ConfidentialRewardToken {
    fn mint(&self, caller: &AccountId, to: &AccountId, amount: u64) -> Result<Handle, TokenError> {
        if caller != &self.minter {
            tracing::warn!(caller = %caller.short(), "rejected mint from unauthorized caller");
            return Err(TokenError::UnauthorizedMinter(*caller));
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| TokenError::Unavailable("lock poisoned".to_string()))?;

        let new_supply = state
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow)?;

        let minted = self.confidential.from_clear(amount)?;
        let balance = match state.balances.get(to) {
            Some(current) => self.confidential.add(current, &minted)?,
            None => minted,
        };
        self.confidential.grant_access(&balance, to)?;

        state.balances.insert(*to, balance);
        state.total_supply = new_supply;

        tracing::debug!(to = %to.short(), amount, "minted reward units");
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidential::LocalConfidentialService;

    fn setup() -> (Arc<LocalConfidentialService>, ConfidentialRewardToken, AccountId) {
        let service = Arc::new(LocalConfidentialService::new());
        let minter = AccountId::from_label("ledger");
        let token = ConfidentialRewardToken::new(minter, service.clone());
        (service, token, minter)
    }

    #[test]
    fn test_mint_accumulates_balance() {
        let (service, token, minter) = setup();
        let alice = AccountId::from_label("alice");

        token.mint(&minter, &alice, 100).unwrap();
        let balance = token.mint(&minter, &alice, 50).unwrap();

        assert_eq!(token.confidential_balance_of(&alice), Some(balance));
        assert_eq!(service.decrypt_for(&balance, &alice).unwrap(), 150);
        assert_eq!(token.total_supply(), 150);
    }

    #[test]
    fn test_unauthorized_minter_rejected() {
        let (_, token, _) = setup();
        let mallory = AccountId::from_label("mallory");

        assert_eq!(
            token.mint(&mallory, &mallory, 1),
            Err(TokenError::UnauthorizedMinter(mallory))
        );
        assert_eq!(token.total_supply(), 0);
        assert_eq!(token.confidential_balance_of(&mallory), None);
    }

    #[test]
    fn test_supply_overflow() {
        let (_, token, minter) = setup();
        let alice = AccountId::from_label("alice");

        token.mint(&minter, &alice, u64::MAX).unwrap();
        assert_eq!(token.mint(&minter, &alice, 1), Err(TokenError::SupplyOverflow));
        assert_eq!(token.total_supply(), u64::MAX);
    }

    #[test]
    fn test_snapshot_restores_balances() {
        let (service, token, minter) = setup();
        let alice = AccountId::from_label("alice");
        let balance = token.mint(&minter, &alice, 30).unwrap();

        let restored = ConfidentialRewardToken::new(minter, service.clone());
        restored.load(token.snapshot().unwrap()).unwrap();
        assert_eq!(restored.confidential_balance_of(&alice), Some(balance));
        assert_eq!(restored.total_supply(), 30);

        let topped_up = restored.mint(&minter, &alice, 12).unwrap();
        assert_eq!(service.decrypt_for(&topped_up, &alice).unwrap(), 42);
    }
}
