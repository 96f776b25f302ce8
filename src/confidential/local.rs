//! In-Process Confidential Value Service
//!
//! Simulates an encrypted-integer coprocessor and its disclosure oracle.
//! Values live in a table keyed by freshly derived handles; proofs are
//! keyed SHA-256 attestations over `(handles, clear bytes)`.
//!
//! Every `add`, `from_clear` and `zero` allocates a new ciphertext; nothing
//! is freed implicitly. Owners call [`LocalConfidentialService::retain`]
//! with the set of handles still referenced to drop superseded values.
//!
//! The whole table, oracle key included, round-trips through
//! [`ConfidentialSnapshot`] so handles stay valid across restarts.
//!
//! Not a cryptographic system. Use for development, tests and the CLI.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::traits::{encode_clear_values, ConfidentialError, ConfidentialValueService, DisclosureProof};
use crate::types::{AccountId, Handle};

#[derive(Debug, Clone)]
struct Ciphertext {
    value: u64,
    acl: HashSet<AccountId>,
    disclosable: bool,
}

struct Inner {
    /// Secret attestation key of the disclosure oracle
    oracle_key: [u8; 32],
    ciphertexts: HashMap<Handle, Ciphertext>,
    counter: u64,
}

/// One stored ciphertext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextRecord {
    pub handle: Handle,
    pub value: u64,
    pub acl: Vec<AccountId>,
    pub disclosable: bool,
}

/// Full service state, sorted by handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidentialSnapshot {
    pub oracle_key: [u8; 32],
    pub counter: u64,
    pub ciphertexts: Vec<CiphertextRecord>,
}

/// In-memory confidential value service
pub struct LocalConfidentialService {
    inner: RwLock<Inner>,
}

impl LocalConfidentialService {
    /// Create a service with a random oracle key
    pub fn new() -> Self {
        Self::with_key(rand::random())
    }

    /// Create a service with a fixed oracle key (reproducible handles and proofs)
    pub fn with_key(oracle_key: [u8; 32]) -> Self {
        Self {
            inner: RwLock::new(Inner {
                oracle_key,
                ciphertexts: HashMap::new(),
                counter: 0,
            }),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, ConfidentialError> {
        self.inner
            .read()
            .map_err(|_| ConfidentialError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, ConfidentialError> {
        self.inner
            .write()
            .map_err(|_| ConfidentialError::Unavailable("lock poisoned".to_string()))
    }

    fn store(&self, value: u64) -> Result<Handle, ConfidentialError> {
        let mut inner = self.write()?;
        inner.counter += 1;

        let mut hasher = Sha256::new();
        hasher.update(b"zstake:handle:");
        hasher.update(inner.oracle_key);
        hasher.update(inner.counter.to_le_bytes());
        let handle = Handle(hasher.finalize().into());

        inner.ciphertexts.insert(
            handle,
            Ciphertext {
                value,
                acl: HashSet::new(),
                disclosable: false,
            },
        );
        Ok(handle)
    }

    fn attest(&self, handles: &[Handle], clear_values: &[u8]) -> Result<Vec<u8>, ConfidentialError> {
        let oracle_key = self.read()?.oracle_key;
        Ok(attestation(&oracle_key, handles, clear_values))
    }

    /// User decryption: returns the clear value if `principal` was granted access
    pub fn decrypt_for(&self, handle: &Handle, principal: &AccountId) -> Result<u64, ConfidentialError> {
        let inner = self.read()?;
        let ct = inner
            .ciphertexts
            .get(handle)
            .ok_or(ConfidentialError::UnknownHandle(*handle))?;

        if !ct.acl.contains(principal) {
            return Err(ConfidentialError::AccessDenied {
                handle: *handle,
                principal: *principal,
            });
        }
        Ok(ct.value)
    }

    /// Public disclosure: clear values plus a proof, for disclosable handles only
    pub fn disclose(&self, handles: &[Handle]) -> Result<(Vec<u64>, DisclosureProof), ConfidentialError> {
        let inner = self.read()?;
        let mut values = Vec::with_capacity(handles.len());

        for handle in handles {
            let ct = inner
                .ciphertexts
                .get(handle)
                .ok_or(ConfidentialError::UnknownHandle(*handle))?;
            if !ct.disclosable {
                return Err(ConfidentialError::NotDisclosable(*handle));
            }
            values.push(ct.value);
        }
        drop(inner);

        let proof = DisclosureProof(self.attest(handles, &encode_clear_values(&values))?);
        Ok((values, proof))
    }

    /// Drop every ciphertext whose handle is not in `live`; returns how many were removed
    pub fn retain(&self, live: &HashSet<Handle>) -> Result<usize, ConfidentialError> {
        let mut inner = self.write()?;
        let before = inner.ciphertexts.len();
        inner.ciphertexts.retain(|handle, _| live.contains(handle));
        Ok(before - inner.ciphertexts.len())
    }

    pub fn snapshot(&self) -> Result<ConfidentialSnapshot, ConfidentialError> {
        let inner = self.read()?;
        let mut ciphertexts: Vec<CiphertextRecord> = inner
            .ciphertexts
            .iter()
            .map(|(handle, ct)| {
                let mut acl: Vec<AccountId> = ct.acl.iter().copied().collect();
                acl.sort();
                CiphertextRecord {
                    handle: *handle,
                    value: ct.value,
                    acl,
                    disclosable: ct.disclosable,
                }
            })
            .collect();
        ciphertexts.sort_by(|a, b| a.handle.cmp(&b.handle));

        Ok(ConfidentialSnapshot {
            oracle_key: inner.oracle_key,
            counter: inner.counter,
            ciphertexts,
        })
    }

    /// Replace all state, oracle key included, with `snapshot`
    pub fn load(&self, snapshot: ConfidentialSnapshot) -> Result<(), ConfidentialError> {
        let ciphertexts = snapshot
            .ciphertexts
            .into_iter()
            .map(|record| {
                (
                    record.handle,
                    Ciphertext {
                        value: record.value,
                        acl: record.acl.into_iter().collect(),
                        disclosable: record.disclosable,
                    },
                )
            })
            .collect();

        let mut inner = self.write()?;
        *inner = Inner {
            oracle_key: snapshot.oracle_key,
            ciphertexts,
            counter: snapshot.counter,
        };
        Ok(())
    }

    /// Number of ciphertexts held
    pub fn len(&self) -> usize {
        self.read().map(|inner| inner.ciphertexts.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LocalConfidentialService {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfidentialValueService for LocalConfidentialService {
    fn zero(&self) -> Result<Handle, ConfidentialError> {
        self.store(0)
    }

    fn add(&self, a: &Handle, b: &Handle) -> Result<Handle, ConfidentialError> {
        let sum = {
            let inner = self.read()?;
            let lhs = inner
                .ciphertexts
                .get(a)
                .ok_or(ConfidentialError::UnknownHandle(*a))?;
            let rhs = inner
                .ciphertexts
                .get(b)
                .ok_or(ConfidentialError::UnknownHandle(*b))?;
            // 64-bit encrypted integers wrap
            lhs.value.wrapping_add(rhs.value)
        };
        self.store(sum)
    }

    fn from_clear(&self, amount: u64) -> Result<Handle, ConfidentialError> {
        self.store(amount)
    }

    fn grant_access(&self, handle: &Handle, principal: &AccountId) -> Result<(), ConfidentialError> {
        let mut inner = self.write()?;
        let ct = inner
            .ciphertexts
            .get_mut(handle)
            .ok_or(ConfidentialError::UnknownHandle(*handle))?;
        ct.acl.insert(*principal);
        Ok(())
    }

    fn make_disclosable(&self, handle: &Handle) -> Result<(), ConfidentialError> {
        let mut inner = self.write()?;
        let ct = inner
            .ciphertexts
            .get_mut(handle)
            .ok_or(ConfidentialError::UnknownHandle(*handle))?;
        ct.disclosable = true;
        Ok(())
    }

    fn verify_disclosure(
        &self,
        handles: &[Handle],
        clear_values: &[u8],
        proof: &DisclosureProof,
    ) -> Result<(), ConfidentialError> {
        {
            let inner = self.read()?;
            for handle in handles {
                match inner.ciphertexts.get(handle) {
                    Some(ct) if ct.disclosable => {}
                    Some(_) => return Err(ConfidentialError::NotDisclosable(*handle)),
                    None => return Err(ConfidentialError::UnknownHandle(*handle)),
                }
            }
        }

        if self.attest(handles, clear_values)? != proof.0 {
            return Err(ConfidentialError::InvalidProof);
        }
        Ok(())
    }
}

fn attestation(oracle_key: &[u8; 32], handles: &[Handle], clear_values: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(b"zstake:disclosure:");
    hasher.update(oracle_key);
    hasher.update((handles.len() as u64).to_le_bytes());
    for handle in handles {
        hasher.update(handle.as_bytes());
    }
    hasher.update(clear_values);
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_decrypt() {
        let service = LocalConfidentialService::with_key([9; 32]);
        let alice = AccountId::from_label("alice");

        let a = service.from_clear(40).unwrap();
        let b = service.from_clear(2).unwrap();
        let sum = service.add(&a, &b).unwrap();
        assert_ne!(sum, a);
        assert_ne!(sum, b);

        assert!(matches!(
            service.decrypt_for(&sum, &alice),
            Err(ConfidentialError::AccessDenied { .. })
        ));

        service.grant_access(&sum, &alice).unwrap();
        assert_eq!(service.decrypt_for(&sum, &alice).unwrap(), 42);
    }

    #[test]
    fn test_add_wraps_at_64_bits() {
        let service = LocalConfidentialService::new();
        let alice = AccountId::from_label("alice");

        let a = service.from_clear(u64::MAX).unwrap();
        let b = service.from_clear(2).unwrap();
        let sum = service.add(&a, &b).unwrap();
        service.grant_access(&sum, &alice).unwrap();
        assert_eq!(service.decrypt_for(&sum, &alice).unwrap(), 1);
    }

    #[test]
    fn test_disclosure_requires_flag() {
        let service = LocalConfidentialService::new();
        let handle = service.from_clear(7).unwrap();

        assert_eq!(
            service.disclose(&[handle]).unwrap_err(),
            ConfidentialError::NotDisclosable(handle)
        );

        service.make_disclosable(&handle).unwrap();
        let (values, proof) = service.disclose(&[handle]).unwrap();
        assert_eq!(values, vec![7]);

        service
            .verify_disclosure(&[handle], &encode_clear_values(&[7]), &proof)
            .unwrap();
    }

    #[test]
    fn test_verify_rejects_wrong_value() {
        let service = LocalConfidentialService::new();
        let handle = service.from_clear(7).unwrap();
        service.make_disclosable(&handle).unwrap();
        let (_, proof) = service.disclose(&[handle]).unwrap();

        assert_eq!(
            service.verify_disclosure(&[handle], &encode_clear_values(&[8]), &proof),
            Err(ConfidentialError::InvalidProof)
        );
    }

    #[test]
    fn test_proof_from_other_service_rejected() {
        let ours = LocalConfidentialService::with_key([1; 32]);
        let theirs = LocalConfidentialService::with_key([2; 32]);

        let handle = ours.from_clear(5).unwrap();
        ours.make_disclosable(&handle).unwrap();

        let forged = DisclosureProof(theirs.attest(&[handle], &encode_clear_values(&[5])).unwrap());
        assert_eq!(
            ours.verify_disclosure(&[handle], &encode_clear_values(&[5]), &forged),
            Err(ConfidentialError::InvalidProof)
        );
    }

    #[test]
    fn test_unknown_handle() {
        let service = LocalConfidentialService::new();
        let bogus = Handle([0xee; 32]);
        assert_eq!(
            service.grant_access(&bogus, &AccountId::from_label("x")),
            Err(ConfidentialError::UnknownHandle(bogus))
        );
    }

    #[test]
    fn test_reloaded_service_keeps_handles_and_proofs() {
        let original = LocalConfidentialService::new();
        let alice = AccountId::from_label("alice");
        let handle = original.from_clear(77).unwrap();
        original.grant_access(&handle, &alice).unwrap();
        original.make_disclosable(&handle).unwrap();
        let (_, proof) = original.disclose(&[handle]).unwrap();

        let json = serde_json::to_string(&original.snapshot().unwrap()).unwrap();
        let reloaded = LocalConfidentialService::new();
        reloaded.load(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(reloaded.decrypt_for(&handle, &alice).unwrap(), 77);
        reloaded
            .verify_disclosure(&[handle], &encode_clear_values(&[77]), &proof)
            .unwrap();

        // Counter carries over, so new handles never collide with restored ones
        let next = reloaded.from_clear(1).unwrap();
        assert_ne!(next, handle);
        assert_eq!(next, original.from_clear(1).unwrap());
    }

    #[test]
    fn test_retain_drops_superseded_values() {
        let service = LocalConfidentialService::new();
        let alice = AccountId::from_label("alice");
        let first = service.from_clear(10).unwrap();
        let second = service.from_clear(5).unwrap();
        let sum = service.add(&first, &second).unwrap();
        service.grant_access(&sum, &alice).unwrap();
        assert_eq!(service.len(), 3);

        let removed = service.retain(&HashSet::from([sum])).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(service.len(), 1);
        assert_eq!(service.decrypt_for(&sum, &alice).unwrap(), 15);
        assert_eq!(
            service.decrypt_for(&first, &alice),
            Err(ConfidentialError::UnknownHandle(first))
        );
    }
}
