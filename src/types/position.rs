//! Stake Position Types
//!
//! Per-account ledger record: confidential principal with its clear mirror,
//! the accrual clock, owed rewards, and the withdrawal state machine.
//!
//! ```text
//! Active ──request_withdraw──▶ AwaitingDisclosure ──finalize_withdraw──▶ Active (empty)
//! ```

use serde::{Deserialize, Serialize};

use super::ids::Handle;

/// Confidential principal bound to its clear-text mirror
///
/// `clear` always equals what the confidential value service would disclose
/// for `handle`. Both fields change together through [`set`](Self::set).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidentialPrincipal {
    /// `None` until the first deposit; treated as confidential zero
    handle: Option<Handle>,
    clear: u64,
}

impl ConfidentialPrincipal {
    pub fn new(handle: Handle, clear: u64) -> Self {
        Self {
            handle: Some(handle),
            clear,
        }
    }

    pub fn handle(&self) -> Option<Handle> {
        self.handle
    }

    pub fn clear(&self) -> u64 {
        self.clear
    }

    pub fn is_empty(&self) -> bool {
        self.clear == 0
    }

    /// Replace both the confidential handle and its clear mirror
    pub fn set(&mut self, handle: Handle, clear: u64) {
        self.handle = Some(handle);
        self.clear = clear;
    }
}

/// Withdrawal protocol state of a position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PositionState {
    /// No withdrawal pending
    #[default]
    Active,
    /// Handle registered and marked disclosable, waiting for finalize
    AwaitingDisclosure { handle: Handle },
}

impl PositionState {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, PositionState::AwaitingDisclosure { .. })
    }

    pub fn pending_handle(&self) -> Option<Handle> {
        match self {
            PositionState::AwaitingDisclosure { handle } => Some(*handle),
            PositionState::Active => None,
        }
    }
}

impl std::fmt::Display for PositionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionState::Active => write!(f, "active"),
            PositionState::AwaitingDisclosure { .. } => write!(f, "awaiting_disclosure"),
        }
    }
}

/// Per-account stake record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    pub principal: ConfidentialPrincipal,
    /// Unix seconds of the last settlement; 0 means never touched
    pub last_accrual_time: u64,
    /// Clear reward units owed and not yet claimed
    pub accrued_rewards: u128,
    pub state: PositionState,
}

impl StakePosition {
    pub fn is_touched(&self) -> bool {
        self.last_accrual_time != 0
    }

    pub fn plain_amount(&self) -> u64 {
        self.principal.clear()
    }

    pub fn confidential_amount(&self) -> Option<Handle> {
        self.principal.handle()
    }

    /// `(plain_amount, accrued_rewards, last_accrual_time)`
    pub fn details(&self) -> StakeDetails {
        StakeDetails {
            plain_amount: self.plain_amount(),
            accrued_rewards: self.accrued_rewards,
            last_accrual_time: self.last_accrual_time,
        }
    }
}

/// Clear-text view of a position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeDetails {
    pub plain_amount: u64,
    pub accrued_rewards: u128,
    pub last_accrual_time: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_set_updates_both_fields() {
        let mut principal = ConfidentialPrincipal::default();
        assert!(principal.is_empty());
        assert_eq!(principal.handle(), None);

        principal.set(Handle([1; 32]), 500);
        assert_eq!(principal.handle(), Some(Handle([1; 32])));
        assert_eq!(principal.clear(), 500);
        assert!(!principal.is_empty());

        principal.set(Handle([2; 32]), 0);
        assert!(principal.is_empty());
    }

    #[test]
    fn test_position_state_serialization() {
        let state = PositionState::AwaitingDisclosure {
            handle: Handle([7; 32]),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("awaiting_disclosure"));

        let back: PositionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pending_handle(), Some(Handle([7; 32])));
    }
}
