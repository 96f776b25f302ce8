//! zStake - Confidential Staking Ledger
//!
//! Users stake a native base asset into a confidential principal, accrue a
//! clear-text yield over time, claim it as a confidential reward token, and
//! withdraw through a two-phase public-disclosure protocol.
//!
//! ## Modules
//!
//! - `ledger` - position state machine, accrual, withdrawal registry
//! - `confidential` - encrypted-integer capability and a local simulator
//! - `token` - reward token minter and base-asset vault
//! - `storage` - SQLite and in-memory persistence
//! - `service` - async single-writer facade with persistence and logging
//! - `common` - configuration, errors, logging

pub mod common;
pub mod confidential;
pub mod ledger;
pub mod service;
pub mod storage;
pub mod token;
pub mod types;

// Re-exports: ledger
pub use ledger::{
    AccrualParams, Checkpoint, ClaimReceipt, Clock, Collaborators, FinalizeReceipt, Ledger, LedgerError, ManualClock,
    StakeReceipt, SystemClock, WithdrawRequest, WithdrawalRegistry,
};

// Re-exports: collaborators
pub use confidential::{ConfidentialError, ConfidentialValueService, DisclosureProof, LocalConfidentialService};
pub use token::{BaseAssetVault, ConfidentialRewardToken, NativeVault, RewardTokenMinter};

// Re-exports: service and infrastructure
pub use common::{Network, ZStakeConfig, ZStakeError};
pub use service::{LocalStack, LocalStackSnapshot, StakingService};
pub use storage::{LedgerCommit, LedgerStore, MemoryLedgerStore, RegistrationChange, SqliteLedgerStore, StorageError};

pub use types::{AccountId, Handle, LedgerEvent, PositionState, StakeDetails, StakePosition};
