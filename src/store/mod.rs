//! Balance Store
//!
//! Repository seam between the orchestrator and durable state. The
//! orchestrator only ever sees these traits; the Postgres implementation
//! backs production and the in-memory one backs tests and embedding.

use async_trait::async_trait;

use crate::domain::Balance;
use crate::ledger::{EntryOrdering, LedgerEntry, NewLedgerEntry};

mod memory;
mod postgres;

pub use memory::MemoryBalanceStore;
pub use postgres::PgBalanceStore;

/// Storage-layer failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Exclusive lock could not be acquired within the configured timeout.
    /// Transient: the caller may retry.
    #[error("Lock acquisition timed out")]
    LockTimeout,

    #[error("Corrupt stored row: {0}")]
    InvalidRow(String),
}

/// Durable mapping from account id to balance, plus the append-only ledger
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Open an atomic unit of work. All locks taken through the returned
    /// scope are held until `commit` or drop (drop rolls back).
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, StoreError>;

    /// Read a balance without locking (query boundary only)
    async fn fetch_balance(&self, account_id: i64) -> Result<Option<Balance>, StoreError>;

    /// List ledger entries attributed to an account
    async fn list_entries(
        &self,
        account_id: i64,
        ordering: EntryOrdering,
    ) -> Result<Vec<LedgerEntry>, StoreError>;
}

/// One atomic read-modify-write unit over exclusively locked balance rows.
///
/// Callers must acquire locks in ascending account id order; both
/// implementations block on a busy row, so an inconsistent order between two
/// concurrent scopes can deadlock until the lock timeout fires.
#[async_trait]
pub trait TransactionScope: Send {
    /// Lock an existing balance row. `None` if the account has never been
    /// seen (a debiting account must pre-exist).
    async fn lock_existing(&mut self, account_id: i64) -> Result<Option<Balance>, StoreError>;

    /// Lock a balance row, creating it at zero first if absent
    async fn lock_or_create(&mut self, account_id: i64) -> Result<Balance, StoreError>;

    /// Write a new value for a row locked earlier in this scope; visible to
    /// other scopes only after commit
    async fn save_balance(&mut self, account_id: i64, balance: Balance) -> Result<(), StoreError>;

    /// Append a ledger entry as part of this atomic unit
    async fn insert_entry(&mut self, entry: NewLedgerEntry) -> Result<(), StoreError>;

    /// Persist everything staged in this scope and release all locks
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
