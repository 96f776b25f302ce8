//! Confidential Value Service Module
//!
//! Capability interface for encrypted integers plus an in-process simulator.

pub mod local;
pub mod traits;

pub use local::{CiphertextRecord, ConfidentialSnapshot, LocalConfidentialService};
pub use traits::{encode_clear_values, ConfidentialError, ConfidentialValueService, DisclosureProof};

#[cfg(test)]
pub use traits::MockConfidentialValueService;
