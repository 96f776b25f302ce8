//! In-Memory Ledger Store
//!
//! Non-persistent storage for tests and local simulation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{LedgerCommit, LedgerStore, RegistrationChange, StorageError, StorageResult};
use crate::types::{AccountId, Handle, StakePosition};

#[derive(Default)]
struct Tables {
    positions: HashMap<AccountId, StakePosition>,
    registrations: HashMap<Handle, AccountId>,
    collaborator_state: Option<String>,
}

/// In-memory ledger store
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn commit(&self, commit: &LedgerCommit) -> StorageResult<()> {
        let mut tables = self.tables.write().await;

        // Validate before the first mutation so a rejected commit writes nothing
        if let RegistrationChange::Insert(handle) = &commit.registration {
            if tables.registrations.contains_key(handle) {
                return Err(StorageError::Duplicate(handle.to_string()));
            }
        }

        tables.positions.insert(commit.account, commit.position.clone());
        match commit.registration {
            RegistrationChange::Unchanged => {}
            RegistrationChange::Insert(handle) => {
                tables.registrations.insert(handle, commit.account);
            }
            RegistrationChange::Remove(handle) => {
                tables.registrations.remove(&handle);
            }
        }
        if let Some(state) = &commit.collaborator_state {
            tables.collaborator_state = Some(state.clone());
        }
        Ok(())
    }

    async fn load_positions(&self) -> StorageResult<Vec<(AccountId, StakePosition)>> {
        let tables = self.tables.read().await;
        Ok(tables.positions.iter().map(|(a, p)| (*a, p.clone())).collect())
    }

    async fn load_registrations(&self) -> StorageResult<Vec<(Handle, AccountId)>> {
        let tables = self.tables.read().await;
        Ok(tables.registrations.iter().map(|(h, a)| (*h, *a)).collect())
    }

    async fn load_collaborator_state(&self) -> StorageResult<Option<String>> {
        Ok(self.tables.read().await.collaborator_state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConfidentialPrincipal, PositionState};

    #[tokio::test]
    async fn test_commit_replaces_position() {
        let store = MemoryLedgerStore::new();
        let account = AccountId::from_label("alice");

        let mut position = StakePosition::default();
        store.commit(&LedgerCommit::new(account, position.clone())).await.unwrap();

        position.principal = ConfidentialPrincipal::new(Handle([1; 32]), 10);
        position.accrued_rewards = 3;
        store.commit(&LedgerCommit::new(account, position.clone())).await.unwrap();

        let loaded = store.load_positions().await.unwrap();
        assert_eq!(loaded, vec![(account, position)]);
        assert_eq!(store.load_collaborator_state().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_registration_lifecycle() {
        let store = MemoryLedgerStore::new();
        let handle = Handle([2; 32]);
        let owner = AccountId::from_label("bob");
        let awaiting = StakePosition {
            principal: ConfidentialPrincipal::new(handle, 8),
            state: PositionState::AwaitingDisclosure { handle },
            ..Default::default()
        };

        let request = LedgerCommit::new(owner, awaiting.clone())
            .with_registration(RegistrationChange::Insert(handle))
            .with_collaborator_state(Some("{}".to_string()));
        store.commit(&request).await.unwrap();
        assert_eq!(store.load_registrations().await.unwrap(), vec![(handle, owner)]);
        assert_eq!(store.load_collaborator_state().await.unwrap().as_deref(), Some("{}"));

        let finalize = LedgerCommit::new(owner, StakePosition::default())
            .with_registration(RegistrationChange::Remove(handle));
        store.commit(&finalize).await.unwrap();
        assert!(store.load_registrations().await.unwrap().is_empty());
        // Absent collaborator state leaves the stored one in place
        assert_eq!(store.load_collaborator_state().await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_duplicate_registration_writes_nothing() {
        let store = MemoryLedgerStore::new();
        let handle = Handle([3; 32]);
        let bob = AccountId::from_label("bob");
        let carol = AccountId::from_label("carol");

        store
            .commit(&LedgerCommit::new(bob, StakePosition::default()).with_registration(RegistrationChange::Insert(handle)))
            .await
            .unwrap();

        let clash = LedgerCommit::new(carol, StakePosition::default())
            .with_registration(RegistrationChange::Insert(handle))
            .with_collaborator_state(Some("carol".to_string()));
        assert!(matches!(store.commit(&clash).await, Err(StorageError::Duplicate(_))));

        let positions = store.load_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].0, bob);
        assert_eq!(store.load_registrations().await.unwrap(), vec![(handle, bob)]);
        assert_eq!(store.load_collaborator_state().await.unwrap(), None);
    }
}
