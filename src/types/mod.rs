//! Shared Types Module
//!
//! Data types shared across the zStake ledger, collaborators and storage.

pub mod events;
pub mod ids;
pub mod position;
pub mod units;

// Re-exports for convenience
pub use events::LedgerEvent;
pub use ids::{AccountId, Handle, IdParseError};
pub use position::{ConfidentialPrincipal, PositionState, StakeDetails, StakePosition};
pub use units::{parse_units, units_to_display, SECONDS_PER_DAY, UNIT_SCALE};
