//! Base Asset Vault
//!
//! Holds the native value attached to stake transactions and releases it
//! on finalized withdrawals.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::AccountId;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VaultError {
    #[error("insufficient vault balance: held {held}, requested {requested}")]
    InsufficientBalance { held: u128, requested: u128 },

    #[error("vault balance overflow")]
    Overflow,

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// Native-asset custody used by the ledger
#[cfg_attr(test, mockall::automock)]
pub trait BaseAssetVault: Send + Sync {
    /// Record value received with a stake transaction
    fn deposit(&self, from: &AccountId, amount: u64) -> Result<(), VaultError>;

    /// Transfer value out to `to`
    fn release(&self, to: &AccountId, amount: u64) -> Result<(), VaultError>;

    /// Value currently held
    fn held(&self) -> u128;
}

/// Vault totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStats {
    pub held: u128,
    pub total_deposited: u128,
    pub total_released: u128,
}

/// Totals plus per-recipient releases, sorted by account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    pub stats: VaultStats,
    pub released_to: Vec<(AccountId, u128)>,
}

#[derive(Default)]
struct Inner {
    stats: VaultStats,
    released_to: HashMap<AccountId, u128>,
}

/// In-memory native vault
#[derive(Default)]
pub struct NativeVault {
    inner: RwLock<Inner>,
}

impl NativeVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> VaultStats {
        self.inner.read().map(|inner| inner.stats).unwrap_or_default()
    }

    /// Total value released to `account`
    pub fn released_to(&self, account: &AccountId) -> u128 {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.released_to.get(account).copied())
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> Result<VaultSnapshot, VaultError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| VaultError::Rejected("lock poisoned".to_string()))?;
        let mut released_to: Vec<(AccountId, u128)> =
            inner.released_to.iter().map(|(account, amount)| (*account, *amount)).collect();
        released_to.sort();
        Ok(VaultSnapshot {
            stats: inner.stats,
            released_to,
        })
    }

    pub fn load(&self, snapshot: VaultSnapshot) -> Result<(), VaultError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| VaultError::Rejected("lock poisoned".to_string()))?;
        *inner = Inner {
            stats: snapshot.stats,
            released_to: snapshot.released_to.into_iter().collect(),
        };
        Ok(())
    }
}

impl BaseAssetVault for NativeVault {
    fn deposit(&self, _from: &AccountId, amount: u64) -> Result<(), VaultError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| VaultError::Rejected("lock poisoned".to_string()))?;

        let amount = amount as u128;
        let held = inner.stats.held.checked_add(amount).ok_or(VaultError::Overflow)?;
        let deposited = inner
            .stats
            .total_deposited
            .checked_add(amount)
            .ok_or(VaultError::Overflow)?;

        inner.stats.held = held;
        inner.stats.total_deposited = deposited;
        Ok(())
    }

    fn release(&self, to: &AccountId, amount: u64) -> Result<(), VaultError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| VaultError::Rejected("lock poisoned".to_string()))?;

        let amount = amount as u128;
        if inner.stats.held < amount {
            return Err(VaultError::InsufficientBalance {
                held: inner.stats.held,
                requested: amount,
            });
        }

        inner.stats.held -= amount;
        inner.stats.total_released = inner.stats.total_released.saturating_add(amount);
        *inner.released_to.entry(*to).or_default() += amount;
        Ok(())
    }

    fn held(&self) -> u128 {
        self.stats().held
    }
}
