//! Ledger error kinds
//!
//! Every error leaves ledger state untouched.

use thiserror::Error;

use crate::confidential::ConfidentialError;
use crate::token::{TokenError, VaultError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Zero-amount stake, or withdraw request on an empty position
    #[error("no stake")]
    NoStake,

    /// Missing or mismatched registration, or rejected disclosure
    #[error("invalid disclosure proof")]
    InvalidProof,

    /// Value outside the confidential domain
    #[error("value exceeds the confidential domain")]
    RewardTooLarge,

    /// Position already has an outstanding withdrawal
    #[error("withdrawal already in progress")]
    WithdrawInProgress,

    #[error("unauthorized minter")]
    UnauthorizedMinter,

    #[error("base asset transfer failed: {0}")]
    TransferFailed(String),

    /// Non-proof failure reported by the confidential value service
    #[error("confidential service error: {0}")]
    Confidential(ConfidentialError),

    #[error("reward mint failed: {0}")]
    MintFailed(String),

    #[error("inconsistent ledger state: {0}")]
    InconsistentState(String),
}

impl LedgerError {
    /// Stable error code for logs and API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::NoStake => "NO_STAKE",
            LedgerError::InvalidProof => "INVALID_PROOF",
            LedgerError::RewardTooLarge => "REWARD_TOO_LARGE",
            LedgerError::WithdrawInProgress => "WITHDRAW_IN_PROGRESS",
            LedgerError::UnauthorizedMinter => "UNAUTHORIZED_MINTER",
            LedgerError::TransferFailed(_) => "TRANSFER_FAILED",
            LedgerError::Confidential(_) => "CONFIDENTIAL_ERROR",
            LedgerError::MintFailed(_) => "MINT_FAILED",
            LedgerError::InconsistentState(_) => "INCONSISTENT_STATE",
        }
    }
}

impl From<ConfidentialError> for LedgerError {
    fn from(e: ConfidentialError) -> Self {
        match e {
            ConfidentialError::InvalidProof => LedgerError::InvalidProof,
            other => LedgerError::Confidential(other),
        }
    }
}

impl From<TokenError> for LedgerError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::UnauthorizedMinter(_) => LedgerError::UnauthorizedMinter,
            TokenError::SupplyOverflow => LedgerError::RewardTooLarge,
            other => LedgerError::MintFailed(other.to_string()),
        }
    }
}

impl From<VaultError> for LedgerError {
    fn from(e: VaultError) -> Self {
        LedgerError::TransferFailed(e.to_string())
    }
}
