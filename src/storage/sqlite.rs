//! SQLite Persistent Storage for Ledger State
//!
//! Durable storage for stake positions, pending withdrawal registrations and
//! collaborator state that survives process restarts. Uses connection
//! pooling via r2d2; each commit runs in a single transaction.
//!
//! Amounts and timestamps are stored as decimal TEXT: principals are `u64`
//! and accrued rewards `u128`, both beyond SQLite's signed 64-bit INTEGER.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::str::FromStr;

use super::traits::{LedgerCommit, LedgerStore, RegistrationChange, StorageError, StorageResult};
use crate::types::{AccountId, ConfidentialPrincipal, Handle, PositionState, StakePosition};

/// Raw `positions` row before parsing
struct PositionRow {
    account: String,
    handle: Option<String>,
    plain_amount: String,
    last_accrual_time: String,
    accrued_rewards: String,
    state: String,
    pending_handle: Option<String>,
}

/// SQLite-backed ledger store with connection pooling
pub struct SqliteLedgerStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteLedgerStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                account TEXT PRIMARY KEY,
                handle TEXT,
                plain_amount TEXT NOT NULL,
                last_accrual_time TEXT NOT NULL,
                accrued_rewards TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'active',
                pending_handle TEXT,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS withdrawal_registrations (
                handle TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_registrations_owner ON withdrawal_registrations(owner);

            CREATE TABLE IF NOT EXISTS collaborator_state (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                state TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_position(row: PositionRow) -> Result<(AccountId, StakePosition), StorageError> {
        let account = parse_field::<AccountId>("account", &row.account)?;
        let plain_amount = parse_field::<u64>("plain_amount", &row.plain_amount)?;

        let principal = match row.handle {
            Some(h) => ConfidentialPrincipal::new(parse_field("handle", &h)?, plain_amount),
            None if plain_amount == 0 => ConfidentialPrincipal::default(),
            None => {
                return Err(StorageError::InvalidData(format!(
                    "position {} has principal without handle",
                    account
                )))
            }
        };

        let state = match (row.state.as_str(), row.pending_handle) {
            ("active", _) => PositionState::Active,
            ("awaiting_disclosure", Some(h)) => PositionState::AwaitingDisclosure {
                handle: parse_field("pending_handle", &h)?,
            },
            (other, _) => {
                return Err(StorageError::InvalidData(format!(
                    "position {} has invalid state {}",
                    account, other
                )))
            }
        };

        Ok((
            account,
            StakePosition {
                principal,
                last_accrual_time: parse_field("last_accrual_time", &row.last_accrual_time)?,
                accrued_rewards: parse_field("accrued_rewards", &row.accrued_rewards)?,
                state,
            },
        ))
    }

    // =========================================================================
    // Sync implementations
    // =========================================================================

    fn commit_sync(&self, commit: &LedgerCommit) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let now = chrono::Utc::now().timestamp();

        upsert_position(&tx, &commit.account, &commit.position, now)?;

        match &commit.registration {
            RegistrationChange::Unchanged => {}
            RegistrationChange::Insert(handle) => {
                tx.execute(
                    "INSERT INTO withdrawal_registrations (handle, owner, created_at) VALUES (?1, ?2, ?3)",
                    params![handle.to_string(), commit.account.to_string(), now],
                )
                .map_err(|e| {
                    if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                        if err.extended_code == 1555 || err.extended_code == 2067 {
                            return StorageError::Duplicate(handle.to_string());
                        }
                    }
                    StorageError::Database(e.to_string())
                })?;
            }
            RegistrationChange::Remove(handle) => {
                tx.execute(
                    "DELETE FROM withdrawal_registrations WHERE handle = ?1",
                    params![handle.to_string()],
                )
                .map_err(|e| StorageError::Database(e.to_string()))?;
            }
        }

        if let Some(state) = &commit.collaborator_state {
            tx.execute(
                r#"
                INSERT INTO collaborator_state (id, state, updated_at) VALUES (0, ?1, ?2)
                ON CONFLICT(id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at
                "#,
                params![state, now],
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;
        }

        // Dropping `tx` on any early return rolls the whole commit back
        tx.commit().map_err(|e| StorageError::Database(e.to_string()))
    }

    fn load_positions_sync(&self) -> Result<Vec<(AccountId, StakePosition)>, StorageError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT account, handle, plain_amount, last_accrual_time, accrued_rewards, \
                 state, pending_handle FROM positions ORDER BY account",
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(PositionRow {
                    account: row.get("account")?,
                    handle: row.get("handle")?,
                    plain_amount: row.get("plain_amount")?,
                    last_accrual_time: row.get("last_accrual_time")?,
                    accrued_rewards: row.get("accrued_rewards")?,
                    state: row.get("state")?,
                    pending_handle: row.get("pending_handle")?,
                })
            })
            .map_err(|e| StorageError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_position).collect()
    }

    fn load_registrations_sync(&self) -> Result<Vec<(Handle, AccountId)>, StorageError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT handle, owner FROM withdrawal_registrations ORDER BY created_at, handle")
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| StorageError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|(handle, owner)| -> StorageResult<(Handle, AccountId)> {
                Ok((parse_field("handle", &handle)?, parse_field("owner", &owner)?))
            })
            .collect()
    }

    fn load_collaborator_state_sync(&self) -> Result<Option<String>, StorageError> {
        let conn = self.conn()?;

        conn.query_row("SELECT state FROM collaborator_state WHERE id = 0", [], |row| row.get(0))
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))
    }
}

fn upsert_position(
    conn: &Connection,
    account: &AccountId,
    position: &StakePosition,
    updated_at: i64,
) -> Result<(), StorageError> {
    conn.execute(
        r#"
        INSERT INTO positions (
            account, handle, plain_amount, last_accrual_time,
            accrued_rewards, state, pending_handle, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(account) DO UPDATE SET
            handle = excluded.handle,
            plain_amount = excluded.plain_amount,
            last_accrual_time = excluded.last_accrual_time,
            accrued_rewards = excluded.accrued_rewards,
            state = excluded.state,
            pending_handle = excluded.pending_handle,
            updated_at = excluded.updated_at
        "#,
        params![
            account.to_string(),
            position.confidential_amount().map(|h| h.to_string()),
            position.plain_amount().to_string(),
            position.last_accrual_time.to_string(),
            position.accrued_rewards.to_string(),
            position.state.to_string(),
            position.state.pending_handle().map(|h| h.to_string()),
            updated_at,
        ],
    )
    .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(())
}

fn parse_field<T: FromStr>(column: &str, value: &str) -> Result<T, StorageError> {
    value
        .parse()
        .map_err(|_| StorageError::InvalidData(format!("bad {} value: {}", column, value)))
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn commit(&self, commit: &LedgerCommit) -> StorageResult<()> {
        self.commit_sync(commit)
    }

    async fn load_positions(&self) -> StorageResult<Vec<(AccountId, StakePosition)>> {
        self.load_positions_sync()
    }

    async fn load_registrations(&self) -> StorageResult<Vec<(Handle, AccountId)>> {
        self.load_registrations_sync()
    }

    async fn load_collaborator_state(&self) -> StorageResult<Option<String>> {
        self.load_collaborator_state_sync()
    }
}
