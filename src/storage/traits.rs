//! Storage Trait Definitions
//!
//! Defines the persistence interface for stake positions, pending
//! withdrawal registrations and opaque collaborator state. Every ledger
//! operation is written as one [`LedgerCommit`] that lands entirely or not
//! at all. Implementations can use SQLite (production) or in-memory maps
//! (testing).

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AccountId, Handle, StakePosition};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Registration table change carried by a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationChange {
    Unchanged,
    /// Fails the whole commit with `Duplicate` if the handle is taken
    Insert(Handle),
    Remove(Handle),
}

/// Everything one ledger operation changed
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerCommit {
    pub account: AccountId,
    pub position: StakePosition,
    pub registration: RegistrationChange,
    /// Serialized in-process collaborator state, replaced when present
    pub collaborator_state: Option<String>,
}

impl LedgerCommit {
    pub fn new(account: AccountId, position: StakePosition) -> Self {
        Self {
            account,
            position,
            registration: RegistrationChange::Unchanged,
            collaborator_state: None,
        }
    }

    pub fn with_registration(mut self, registration: RegistrationChange) -> Self {
        self.registration = registration;
        self
    }

    pub fn with_collaborator_state(mut self, state: Option<String>) -> Self {
        self.collaborator_state = state;
        self
    }
}

/// Ledger state storage interface
///
/// Implementations:
/// - `SqliteLedgerStore` - Production storage with SQLite
/// - `MemoryLedgerStore` - In-memory storage for testing
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Apply `commit` atomically: upsert the position, apply the
    /// registration change and replace collaborator state if present
    async fn commit(&self, commit: &LedgerCommit) -> StorageResult<()>;

    /// Load every persisted position
    async fn load_positions(&self) -> StorageResult<Vec<(AccountId, StakePosition)>>;

    /// Load every pending withdrawal registration
    async fn load_registrations(&self) -> StorageResult<Vec<(Handle, AccountId)>>;

    /// Last committed collaborator state, if any was ever written
    async fn load_collaborator_state(&self) -> StorageResult<Option<String>>;
}
