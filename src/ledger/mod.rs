//! Ledger Module
//!
//! Stake positions, reward accrual and the two-phase withdrawal protocol.
//!
//! This module contains:
//! - `staking` - the `Ledger` state machine
//! - `accrual` - time-based reward formula and settlement
//! - `registry` - disclosed handle -> owner table
//! - `clock` - time sources
//! - `error` - ledger error kinds

pub mod accrual;
pub mod clock;
pub mod error;
pub mod registry;
pub mod staking;


pub use accrual::AccrualParams;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::LedgerError;
pub use registry::WithdrawalRegistry;
pub use staking::{Checkpoint, ClaimReceipt, Collaborators, FinalizeReceipt, Ledger, StakeReceipt, WithdrawRequest};
