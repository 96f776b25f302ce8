//! Confidential Value Service Interface
//!
//! Narrow capability surface the ledger uses for encrypted-integer
//! arithmetic, access control and public disclosure. The ledger never
//! sees plaintext through this interface; it only moves handles around.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AccountId, Handle};

/// Errors from the confidential value service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfidentialError {
    #[error("unknown handle: {0}")]
    UnknownHandle(Handle),

    #[error("access denied to {handle} for {principal}")]
    AccessDenied { handle: Handle, principal: AccountId },

    #[error("handle {0} is not disclosable")]
    NotDisclosable(Handle),

    #[error("invalid disclosure proof")]
    InvalidProof,

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Attestation that a list of handles discloses to specific clear values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureProof(pub Vec<u8>);

impl DisclosureProof {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(s.trim().trim_start_matches("0x")).map(Self)
    }
}

/// Encode clear values the way disclosure proofs commit to them:
/// one 32-byte big-endian word per value, in handle order
pub fn encode_clear_values(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 32);
    for value in values {
        out.extend_from_slice(&[0u8; 24]);
        out.extend_from_slice(&value.to_be_bytes());
    }
    out
}

/// Opaque encrypted-integer service
///
/// Implementations:
/// - `LocalConfidentialService` - in-process simulator (dev, tests, CLI)
#[cfg_attr(test, mockall::automock)]
pub trait ConfidentialValueService: Send + Sync {
    /// Produce a confidential zero
    fn zero(&self) -> Result<Handle, ConfidentialError>;

    /// Homomorphic addition; result is a fresh handle
    fn add(&self, a: &Handle, b: &Handle) -> Result<Handle, ConfidentialError>;

    /// Encrypt a known clear value
    fn from_clear(&self, amount: u64) -> Result<Handle, ConfidentialError>;

    /// Permit `principal` to decrypt `handle` off-line
    fn grant_access(&self, handle: &Handle, principal: &AccountId) -> Result<(), ConfidentialError>;

    /// Mark a handle as eligible for public disclosure
    fn make_disclosable(&self, handle: &Handle) -> Result<(), ConfidentialError>;

    /// Check that `handles` disclose to `clear_values` (see [`encode_clear_values`])
    fn verify_disclosure(
        &self,
        handles: &[Handle],
        clear_values: &[u8],
        proof: &DisclosureProof,
    ) -> Result<(), ConfidentialError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_value_encoding() {
        let encoded = encode_clear_values(&[1, u64::MAX]);
        assert_eq!(encoded.len(), 64);
        assert_eq!(encoded[31], 1);
        assert!(encoded[..31].iter().all(|b| *b == 0));
        assert!(encoded[56..].iter().all(|b| *b == 0xff));
    }

    #[test]
    fn test_proof_hex_roundtrip() {
        let proof = DisclosureProof(vec![0xde, 0xad]);
        assert_eq!(DisclosureProof::from_hex("0xdead").unwrap(), proof);
    }
}
