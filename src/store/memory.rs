//! In-memory Balance Store
//!
//! Keeps balances behind per-account async mutexes and the ledger in a plain
//! vector. Mutations are staged inside a scope and applied on commit while
//! the row locks are still held, so dropping a scope rolls back cleanly.
//! Mirrors the Postgres implementation's semantics, including the bounded
//! lock acquisition.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::timeout;

use crate::domain::Balance;
use crate::ledger::{EntryOrdering, LedgerEntry, NewLedgerEntry};

use super::{BalanceStore, StoreError, TransactionScope};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

struct Shared {
    /// Account id -> lockable balance cell. Cells are created implicitly and
    /// never removed.
    accounts: Mutex<HashMap<i64, Arc<AsyncMutex<Decimal>>>>,
    entries: Mutex<Vec<LedgerEntry>>,
    next_entry_id: AtomicI64,
}

/// Balance store backed by process memory
#[derive(Clone)]
pub struct MemoryBalanceStore {
    shared: Arc<Shared>,
    lock_timeout: Duration,
}

impl MemoryBalanceStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                accounts: Mutex::new(HashMap::new()),
                entries: Mutex::new(Vec::new()),
                next_entry_id: AtomicI64::new(1),
            }),
            lock_timeout,
        }
    }

    fn cell(&self, account_id: i64) -> Option<Arc<AsyncMutex<Decimal>>> {
        lock_poisonless(&self.shared.accounts).get(&account_id).cloned()
    }
}

impl Default for MemoryBalanceStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A poisoned map mutex only means another thread panicked mid-read; the data
/// itself is still consistent, so recover the guard instead of propagating.
fn lock_poisonless<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl BalanceStore for MemoryBalanceStore {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, StoreError> {
        Ok(Box::new(MemoryScope {
            shared: Arc::clone(&self.shared),
            lock_timeout: self.lock_timeout,
            guards: HashMap::new(),
            staged_balances: HashMap::new(),
            staged_entries: Vec::new(),
        }))
    }

    async fn fetch_balance(&self, account_id: i64) -> Result<Option<Balance>, StoreError> {
        let Some(cell) = self.cell(account_id) else {
            return Ok(None);
        };

        let guard = timeout(self.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout)?;

        Ok(Some(stored_balance(account_id, *guard)?))
    }

    async fn list_entries(
        &self,
        account_id: i64,
        ordering: EntryOrdering,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut entries: Vec<LedgerEntry> = lock_poisonless(&self.shared.entries)
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();

        ordering.sort(&mut entries);
        Ok(entries)
    }
}

struct MemoryScope {
    shared: Arc<Shared>,
    lock_timeout: Duration,
    guards: HashMap<i64, OwnedMutexGuard<Decimal>>,
    staged_balances: HashMap<i64, Decimal>,
    staged_entries: Vec<NewLedgerEntry>,
}

impl MemoryScope {
    async fn lock_cell(
        &mut self,
        account_id: i64,
        cell: Arc<AsyncMutex<Decimal>>,
    ) -> Result<Balance, StoreError> {
        let guard = timeout(self.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout)?;

        let balance = stored_balance(account_id, *guard)?;
        self.guards.insert(account_id, guard);
        Ok(balance)
    }

    fn current(&self, account_id: i64) -> Result<Balance, StoreError> {
        let value = self
            .staged_balances
            .get(&account_id)
            .copied()
            .or_else(|| self.guards.get(&account_id).map(|g| **g))
            .ok_or_else(|| not_locked(account_id))?;

        stored_balance(account_id, value)
    }
}

fn stored_balance(account_id: i64, value: Decimal) -> Result<Balance, StoreError> {
    Balance::new(value)
        .map_err(|e| StoreError::InvalidRow(format!("balance of account {account_id}: {e}")))
}

fn not_locked(account_id: i64) -> StoreError {
    StoreError::InvalidRow(format!("account {account_id} is not locked in this scope"))
}

#[async_trait]
impl TransactionScope for MemoryScope {
    async fn lock_existing(&mut self, account_id: i64) -> Result<Option<Balance>, StoreError> {
        if self.guards.contains_key(&account_id) {
            return self.current(account_id).map(Some);
        }

        let cell = lock_poisonless(&self.shared.accounts)
            .get(&account_id)
            .cloned();
        let Some(cell) = cell else {
            return Ok(None);
        };

        self.lock_cell(account_id, cell).await.map(Some)
    }

    async fn lock_or_create(&mut self, account_id: i64) -> Result<Balance, StoreError> {
        if self.guards.contains_key(&account_id) {
            return self.current(account_id);
        }

        let cell = lock_poisonless(&self.shared.accounts)
            .entry(account_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(Decimal::ZERO)))
            .clone();

        self.lock_cell(account_id, cell).await
    }

    async fn save_balance(&mut self, account_id: i64, balance: Balance) -> Result<(), StoreError> {
        if !self.guards.contains_key(&account_id) {
            return Err(not_locked(account_id));
        }

        self.staged_balances.insert(account_id, balance.value());
        Ok(())
    }

    async fn insert_entry(&mut self, entry: NewLedgerEntry) -> Result<(), StoreError> {
        self.staged_entries.push(entry);
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        for (account_id, value) in self.staged_balances.drain() {
            let guard = self
                .guards
                .get_mut(&account_id)
                .ok_or_else(|| not_locked(account_id))?;
            **guard = value;
        }

        let mut entries = lock_poisonless(&self.shared.entries);
        for new in self.staged_entries.drain(..) {
            let id = self.shared.next_entry_id.fetch_add(1, Ordering::SeqCst);
            entries.push(LedgerEntry {
                id,
                account_id: new.account_id,
                from_account_id: new.from_account_id,
                to_account_id: new.to_account_id,
                balance_before: new.balance_before.value(),
                balance_after: new.balance_after.value(),
                amount: new.amount.value(),
                operation: new.operation,
                created_at: new.created_at,
                comment: new.comment,
            });
        }

        // Guards drop here, releasing the row locks after the writes landed
        Ok(())
    }
}
