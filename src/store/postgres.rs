//! Postgres Balance Store
//!
//! Row locking via `SELECT ... FOR UPDATE` inside a single transaction per
//! scope. `SET LOCAL lock_timeout` bounds lock acquisition; Postgres reports
//! an exceeded timeout as SQLSTATE 55P03, surfaced as a transient
//! `StoreError::LockTimeout`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::Balance;
use crate::ledger::{EntryOrdering, LedgerEntry, NewLedgerEntry};

use super::{BalanceStore, StoreError, TransactionScope};

const LOCK_TIMEOUT_SQLSTATE: &str = "55P03";

/// Balance store backed by Postgres
#[derive(Debug, Clone)]
pub struct PgBalanceStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgBalanceStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

fn map_db_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(LOCK_TIMEOUT_SQLSTATE) {
            return StoreError::LockTimeout;
        }
    }
    StoreError::Database(e)
}

fn stored_balance(account_id: i64, value: Decimal) -> Result<Balance, StoreError> {
    Balance::new(value)
        .map_err(|e| StoreError::InvalidRow(format!("balance of account {account_id}: {e}")))
}

#[async_trait]
impl BalanceStore for PgBalanceStore {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // lock_timeout only accepts a literal, not a bind parameter
        let set_timeout = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout.as_millis());
        sqlx::query(&set_timeout).execute(&mut *tx).await?;

        Ok(Box::new(PgScope { tx }))
    }

    async fn fetch_balance(&self, account_id: i64) -> Result<Option<Balance>, StoreError> {
        let amount: Option<Decimal> =
            sqlx::query_scalar("SELECT amount FROM balances WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;

        amount.map(|v| stored_balance(account_id, v)).transpose()
    }

    async fn list_entries(
        &self,
        account_id: i64,
        ordering: EntryOrdering,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let query = format!(
            r#"
            SELECT id, account_id, from_account_id, to_account_id,
                   balance_before, balance_after, amount, operation,
                   created_at, comment
            FROM ledger_entries
            WHERE account_id = $1
            ORDER BY {}
            "#,
            ordering.sql_clause()
        );

        type Row = (
            i64,
            i64,
            Option<i64>,
            Option<i64>,
            Decimal,
            Decimal,
            Decimal,
            String,
            DateTime<Utc>,
            String,
        );

        let rows: Vec<Row> = sqlx::query_as(&query)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                let (
                    id,
                    account_id,
                    from_account_id,
                    to_account_id,
                    balance_before,
                    balance_after,
                    amount,
                    operation,
                    created_at,
                    comment,
                ) = row;

                let operation = operation.parse().map_err(|_| {
                    StoreError::InvalidRow(format!("unknown operation '{operation}' in entry {id}"))
                })?;

                Ok(LedgerEntry {
                    id,
                    account_id,
                    from_account_id,
                    to_account_id,
                    balance_before,
                    balance_after,
                    amount,
                    operation,
                    created_at,
                    comment,
                })
            })
            .collect()
    }
}

struct PgScope {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TransactionScope for PgScope {
    async fn lock_existing(&mut self, account_id: i64) -> Result<Option<Balance>, StoreError> {
        let amount: Option<Decimal> =
            sqlx::query_scalar("SELECT amount FROM balances WHERE account_id = $1 FOR UPDATE")
                .bind(account_id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(map_db_err)?;

        amount.map(|v| stored_balance(account_id, v)).transpose()
    }

    async fn lock_or_create(&mut self, account_id: i64) -> Result<Balance, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO balances (account_id, amount)
            VALUES ($1, 0)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        self.lock_existing(account_id).await?.ok_or_else(|| {
            StoreError::InvalidRow(format!("account {account_id} vanished after upsert"))
        })
    }

    async fn save_balance(&mut self, account_id: i64, balance: Balance) -> Result<(), StoreError> {
        sqlx::query("UPDATE balances SET amount = $2 WHERE account_id = $1")
            .bind(account_id)
            .bind(balance.value())
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_err)?;

        Ok(())
    }

    async fn insert_entry(&mut self, entry: NewLedgerEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (
                account_id, from_account_id, to_account_id,
                balance_before, balance_after, amount,
                operation, created_at, comment
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.account_id)
        .bind(entry.from_account_id)
        .bind(entry.to_account_id)
        .bind(entry.balance_before.value())
        .bind(entry.balance_after.value())
        .bind(entry.amount.value())
        .bind(entry.operation.as_str())
        .bind(entry.created_at)
        .bind(entry.comment)
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_err)?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(StoreError::Database)
    }
}
