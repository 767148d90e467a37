//! Transaction Orchestrator
//!
//! Executes credit, debit and transfer as one atomic unit: shape validation
//! before any lock, exclusive row locks in canonical order, in-memory
//! mutation, then balances and ledger entries persisted together. Any abort
//! path drops the scope, which rolls everything back.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{Amount, Balance, DomainError, OperationKind};
use crate::error::AppError;
use crate::ledger::{self, MAX_USER_COMMENT_LEN};
use crate::store::BalanceStore;

/// A validated operation request
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub operation: OperationKind,
    pub amount: Amount,
    pub from_account_id: Option<i64>,
    pub to_account_id: Option<i64>,
    pub comment: Option<String>,
}

/// Before/after snapshot of one account touched by an operation
#[derive(Debug, Clone, Copy)]
pub struct SideChange {
    pub account_id: i64,
    pub before: Balance,
    pub after: Balance,
}

/// Result of a committed operation
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub operation: OperationKind,
    pub amount: Amount,
    pub from: Option<SideChange>,
    pub to: Option<SideChange>,
    pub completed_at: DateTime<Utc>,
}

impl TransactionOutcome {
    /// The balance reported to the caller: the debited side for debit and
    /// transfer, the credited side for credit.
    pub fn primary_balance(&self) -> Balance {
        let side = if self.operation.debits_source() {
            self.from.as_ref()
        } else {
            self.to.as_ref()
        };

        side.expect("committed outcome always carries its primary side").after
    }

    /// Completion timestamp as `DD.MM.YYYY HH:MM:SS`
    pub fn completed_at_display(&self) -> String {
        ledger::format_timestamp(self.completed_at)
    }
}

/// Which balances an operation locks, and how
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    /// Debit/transfer source: the account must already exist
    MustExist,
    /// Credit/transfer target: created at zero when unseen
    CreateIfMissing,
}

/// Composes the balance store and the ledger into atomic operations
pub struct TransactionOrchestrator {
    store: Arc<dyn BalanceStore>,
}

impl TransactionOrchestrator {
    pub fn new(store: Arc<dyn BalanceStore>) -> Self {
        Self { store }
    }

    /// Execute one operation end to end.
    ///
    /// Validation that needs no locks happens first; once locks are held the
    /// only abort paths are insufficient funds and storage failure, both of
    /// which leave stored state untouched.
    pub async fn process(&self, request: TransactionRequest) -> Result<TransactionOutcome, AppError> {
        let (from_id, to_id) = validate_shape(&request)?;

        let mut scope = self.store.begin().await?;

        // Canonical lock order: ascending account id, regardless of the
        // direction funds move. Two opposite transfers between the same pair
        // then always contend on the lower id first and cannot deadlock.
        let mut steps: Vec<(i64, LockMode)> = Vec::with_capacity(2);
        if let Some(from) = from_id {
            steps.push((from, LockMode::MustExist));
        }
        if let Some(to) = to_id {
            steps.push((to, LockMode::CreateIfMissing));
        }
        steps.sort_by_key(|(id, _)| *id);

        let mut locked: HashMap<i64, Balance> = HashMap::with_capacity(steps.len());
        for (account_id, mode) in steps {
            let balance = match mode {
                LockMode::MustExist => scope
                    .lock_existing(account_id)
                    .await?
                    .ok_or(AppError::AccountNotFound(account_id))?,
                LockMode::CreateIfMissing => scope.lock_or_create(account_id).await?,
            };
            locked.insert(account_id, balance);
        }

        let from = from_id
            .map(|account_id| {
                let before = locked[&account_id];
                if !before.is_sufficient_for(&request.amount) {
                    return Err(DomainError::InsufficientFunds {
                        required: request.amount.value(),
                        available: before.value(),
                    });
                }
                let after = before.debit(&request.amount)?;
                Ok(SideChange { account_id, before, after })
            })
            .transpose()?;

        let to = to_id
            .map(|account_id| {
                let before = locked[&account_id];
                let after = before.credit(&request.amount)?;
                Ok::<_, DomainError>(SideChange { account_id, before, after })
            })
            .transpose()?;

        let outcome = TransactionOutcome {
            operation: request.operation,
            amount: request.amount,
            from,
            to,
            completed_at: Utc::now(),
        };

        for side in [outcome.from.as_ref(), outcome.to.as_ref()].into_iter().flatten() {
            scope.save_balance(side.account_id, side.after).await?;
        }

        for entry in ledger::entries_for(&outcome, request.comment.as_deref()) {
            scope.insert_entry(entry).await?;
        }

        scope.commit().await?;

        tracing::info!(
            operation = %outcome.operation,
            amount = %outcome.amount,
            from_account_id = ?from_id,
            to_account_id = ?to_id,
            "Operation committed"
        );

        Ok(outcome)
    }
}

/// Structural validation that requires no locks: operation/counterparty
/// pairing, self-transfer prohibition and the user-comment budget.
fn validate_shape(request: &TransactionRequest) -> Result<(Option<i64>, Option<i64>), DomainError> {
    if let Some(comment) = &request.comment {
        let got = comment.chars().count();
        if got > MAX_USER_COMMENT_LEN {
            return Err(DomainError::CommentTooLong {
                max: MAX_USER_COMMENT_LEN,
                got,
            });
        }
    }

    match request.operation {
        OperationKind::Credit => {
            let to = request
                .to_account_id
                .ok_or(DomainError::MissingTargetAccount)?;
            Ok((None, Some(to)))
        }
        OperationKind::Debit => {
            let from = request
                .from_account_id
                .ok_or(DomainError::MissingSourceAccount)?;
            Ok((Some(from), None))
        }
        OperationKind::Transfer => {
            let (from, to) = request
                .from_account_id
                .zip(request.to_account_id)
                .ok_or(DomainError::MissingTransferAccounts)?;
            if from == to {
                return Err(DomainError::SelfTransfer);
            }
            Ok((Some(from), Some(to)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(
        operation: OperationKind,
        from: Option<i64>,
        to: Option<i64>,
    ) -> TransactionRequest {
        TransactionRequest {
            operation,
            amount: "10.00".parse().unwrap(),
            from_account_id: from,
            to_account_id: to,
            comment: None,
        }
    }

    #[test]
    fn test_shape_credit_requires_target() {
        let err = validate_shape(&request(OperationKind::Credit, Some(1), None)).unwrap_err();
        assert_eq!(err, DomainError::MissingTargetAccount);

        let (from, to) = validate_shape(&request(OperationKind::Credit, None, Some(2))).unwrap();
        assert_eq!((from, to), (None, Some(2)));
    }

    #[test]
    fn test_shape_debit_requires_source() {
        let err = validate_shape(&request(OperationKind::Debit, None, Some(2))).unwrap_err();
        assert_eq!(err, DomainError::MissingSourceAccount);

        let (from, to) = validate_shape(&request(OperationKind::Debit, Some(1), None)).unwrap();
        assert_eq!((from, to), (Some(1), None));
    }

    #[test]
    fn test_shape_transfer_requires_both_sides() {
        for (from, to) in [(None, Some(2)), (Some(1), None), (None, None)] {
            let err = validate_shape(&request(OperationKind::Transfer, from, to)).unwrap_err();
            assert_eq!(err, DomainError::MissingTransferAccounts);
        }
    }

    #[test]
    fn test_shape_rejects_self_transfer() {
        let err = validate_shape(&request(OperationKind::Transfer, Some(1), Some(1))).unwrap_err();
        assert_eq!(err, DomainError::SelfTransfer);
    }

    #[test]
    fn test_shape_rejects_oversized_comment() {
        let mut req = request(OperationKind::Credit, None, Some(1));
        req.comment = Some("я".repeat(MAX_USER_COMMENT_LEN + 1));

        let err = validate_shape(&req).unwrap_err();
        assert!(matches!(err, DomainError::CommentTooLong { .. }));

        // Exactly at the limit is fine
        req.comment = Some("я".repeat(MAX_USER_COMMENT_LEN));
        assert!(validate_shape(&req).is_ok());
    }
}
