//! Ledger Events
//!
//! Emitted by every committed ledger transaction, in commit order.

use serde::{Deserialize, Serialize};

use super::ids::{AccountId, Handle};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Principal topped up; only the new confidential handle is published
    Staked {
        account: AccountId,
        handle: Handle,
        timestamp: u64,
    },
    /// Rewards minted to the account as a confidential balance
    InterestClaimed {
        account: AccountId,
        amount: u64,
        balance_handle: Handle,
        timestamp: u64,
    },
    /// Position marked disclosable; `plain_amount` is the claimed value to check
    WithdrawRequested {
        account: AccountId,
        handle: Handle,
        plain_amount: u64,
        timestamp: u64,
    },
    /// Disclosure verified and base asset released
    WithdrawFinalized {
        account: AccountId,
        handle: Handle,
        amount: u64,
        timestamp: u64,
    },
}

impl LedgerEvent {
    pub fn account(&self) -> &AccountId {
        match self {
            LedgerEvent::Staked { account, .. }
            | LedgerEvent::InterestClaimed { account, .. }
            | LedgerEvent::WithdrawRequested { account, .. }
            | LedgerEvent::WithdrawFinalized { account, .. } => account,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::Staked { .. } => "staked",
            LedgerEvent::InterestClaimed { .. } => "interest_claimed",
            LedgerEvent::WithdrawRequested { .. } => "withdraw_requested",
            LedgerEvent::WithdrawFinalized { .. } => "withdraw_finalized",
        }
    }
}
