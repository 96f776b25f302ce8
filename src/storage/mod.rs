//! Storage Module
//!
//! Persistence for ledger state:
//! - `traits` - the `LedgerStore` interface and storage errors
//! - `memory` - in-memory store for tests and simulation
//! - `sqlite` - SQLite store for durable deployments

pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::MemoryLedgerStore;
pub use sqlite::SqliteLedgerStore;
pub use traits::{LedgerCommit, LedgerStore, RegistrationChange, StorageError, StorageResult};
