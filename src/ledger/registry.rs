//! Withdrawal Registry
//!
//! Disclosed handle -> owning account. An entry exists only between
//! `request_withdraw` and the matching `finalize_withdraw`.

use std::collections::HashMap;

use super::error::LedgerError;
use crate::types::{AccountId, Handle};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithdrawalRegistry {
    entries: HashMap<Handle, AccountId>,
}

impl WithdrawalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for `owner`; fails if the handle is already registered
    pub fn insert(&mut self, handle: Handle, owner: AccountId) -> Result<(), LedgerError> {
        if self.entries.contains_key(&handle) {
            return Err(LedgerError::WithdrawInProgress);
        }
        self.entries.insert(handle, owner);
        Ok(())
    }

    pub fn lookup(&self, handle: &Handle) -> Option<AccountId> {
        self.entries.get(handle).copied()
    }

    pub fn remove(&mut self, handle: &Handle) -> Option<AccountId> {
        self.entries.remove(handle)
    }

    pub fn contains(&self, handle: &Handle) -> bool {
        self.entries.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Handle, &AccountId)> {
        self.entries.iter()
    }
}
