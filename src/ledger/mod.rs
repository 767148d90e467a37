//! Ledger
//!
//! Append-only audit records of completed operations. Entries are built from
//! a finished [`TransactionOutcome`](crate::orchestrator::TransactionOutcome)
//! and never mutated afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

use crate::domain::{Amount, Balance, OperationKind};
use crate::orchestrator::TransactionOutcome;

pub mod comment;

/// Hard cap on a stored ledger comment, matching the TEXT column contract
pub const MAX_COMMENT_LEN: usize = 1024;

/// Cap on the caller-supplied part of the comment. The generated prefix
/// (label, sum, balance, timestamp) never exceeds 128 characters, so this
/// keeps the stored comment within MAX_COMMENT_LEN without truncation.
pub const MAX_USER_COMMENT_LEN: usize = 896;

/// Wall-clock display format used in comments and API responses
const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Render a commit timestamp as `DD.MM.YYYY HH:MM:SS`
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Ledger entry not yet assigned an id by the store
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub account_id: i64,
    pub from_account_id: Option<i64>,
    pub to_account_id: Option<i64>,
    pub balance_before: Balance,
    pub balance_after: Balance,
    pub amount: Amount,
    pub operation: OperationKind,
    pub created_at: DateTime<Utc>,
    pub comment: String,
}

/// Persisted ledger entry, as read back for history listings
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: i64,
    pub from_account_id: Option<i64>,
    pub to_account_id: Option<i64>,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub amount: Decimal,
    pub operation: OperationKind,
    pub created_at: DateTime<Utc>,
    pub comment: String,
}

/// Build the ledger entries for a completed operation, one per touched side.
///
/// Both sides of a transfer share the same `created_at` and `amount`, and each
/// carries the counterparty pair of the whole operation.
pub fn entries_for(outcome: &TransactionOutcome, user_comment: Option<&str>) -> Vec<NewLedgerEntry> {
    let completed_at = format_timestamp(outcome.completed_at);
    let mut entries = Vec::with_capacity(2);

    let from_id = outcome.from.as_ref().map(|side| side.account_id);
    let to_id = outcome.to.as_ref().map(|side| side.account_id);

    for side in [outcome.from.as_ref(), outcome.to.as_ref()].into_iter().flatten() {
        entries.push(NewLedgerEntry {
            account_id: side.account_id,
            from_account_id: from_id,
            to_account_id: to_id,
            balance_before: side.before,
            balance_after: side.after,
            amount: outcome.amount,
            operation: outcome.operation,
            created_at: outcome.completed_at,
            comment: comment::generate(
                outcome.operation,
                outcome.amount,
                side.after,
                &completed_at,
                user_comment,
            ),
        });
    }

    entries
}

/// Caller-selected ordering for history listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryOrdering {
    #[default]
    CreatedAtDesc,
    CreatedAtAsc,
    AmountDesc,
    AmountAsc,
    IdDesc,
    IdAsc,
}

impl EntryOrdering {
    /// ORDER BY clause for the Postgres store. Ties on the ordering field are
    /// broken by id so transfer pairs (same created_at) list deterministically.
    pub fn sql_clause(&self) -> &'static str {
        match self {
            EntryOrdering::CreatedAtDesc => "created_at DESC, id DESC",
            EntryOrdering::CreatedAtAsc => "created_at ASC, id ASC",
            EntryOrdering::AmountDesc => "amount DESC, id DESC",
            EntryOrdering::AmountAsc => "amount ASC, id ASC",
            EntryOrdering::IdDesc => "id DESC",
            EntryOrdering::IdAsc => "id ASC",
        }
    }

    /// Apply this ordering to an in-memory entry list
    pub fn sort(&self, entries: &mut [LedgerEntry]) {
        match self {
            EntryOrdering::CreatedAtDesc => {
                entries.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)))
            }
            EntryOrdering::CreatedAtAsc => {
                entries.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)))
            }
            EntryOrdering::AmountDesc => {
                entries.sort_by(|a, b| (b.amount, b.id).cmp(&(a.amount, a.id)))
            }
            EntryOrdering::AmountAsc => {
                entries.sort_by(|a, b| (a.amount, a.id).cmp(&(b.amount, b.id)))
            }
            EntryOrdering::IdDesc => entries.sort_by(|a, b| b.id.cmp(&a.id)),
            EntryOrdering::IdAsc => entries.sort_by(|a, b| a.id.cmp(&b.id)),
        }
    }
}

impl FromStr for EntryOrdering {
    type Err = ();

    /// Parse the `ordering` query value; a leading `-` means descending.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-created_at" => Ok(EntryOrdering::CreatedAtDesc),
            "created_at" => Ok(EntryOrdering::CreatedAtAsc),
            "-amount" => Ok(EntryOrdering::AmountDesc),
            "amount" => Ok(EntryOrdering::AmountAsc),
            "-id" => Ok(EntryOrdering::IdDesc),
            "id" => Ok(EntryOrdering::IdAsc),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::SideChange;
    use rust_decimal_macros::dec;

    fn entry(id: i64, amount: Decimal, created_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id,
            account_id: 1,
            from_account_id: None,
            to_account_id: Some(1),
            balance_before: dec!(0),
            balance_after: amount,
            amount,
            operation: OperationKind::Credit,
            created_at,
            comment: String::new(),
        }
    }

    #[test]
    fn test_format_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2026-08-23T09:05:07Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(ts), "23.08.2026 09:05:07");
    }

    #[test]
    fn test_ordering_parse() {
        assert_eq!("-created_at".parse(), Ok(EntryOrdering::CreatedAtDesc));
        assert_eq!("amount".parse(), Ok(EntryOrdering::AmountAsc));
        assert_eq!("-id".parse(), Ok(EntryOrdering::IdDesc));
        assert!("balance".parse::<EntryOrdering>().is_err());
    }

    #[test]
    fn test_ordering_sort_breaks_ties_by_id() {
        let ts = Utc::now();
        let mut entries = vec![entry(2, dec!(10), ts), entry(1, dec!(10), ts)];

        EntryOrdering::CreatedAtDesc.sort(&mut entries);
        assert_eq!(entries[0].id, 2);

        EntryOrdering::CreatedAtAsc.sort(&mut entries);
        assert_eq!(entries[0].id, 1);
    }

    #[test]
    fn test_entries_for_transfer_mirror() {
        let completed_at = Utc::now();
        let outcome = TransactionOutcome {
            operation: OperationKind::Transfer,
            amount: "50.00".parse().unwrap(),
            from: Some(SideChange {
                account_id: 1,
                before: Balance::new(dec!(100)).unwrap(),
                after: Balance::new(dec!(50)).unwrap(),
            }),
            to: Some(SideChange {
                account_id: 2,
                before: Balance::zero(),
                after: Balance::new(dec!(50)).unwrap(),
            }),
            completed_at,
        };

        let entries = entries_for(&outcome, None);
        assert_eq!(entries.len(), 2);

        for e in &entries {
            assert_eq!(e.from_account_id, Some(1));
            assert_eq!(e.to_account_id, Some(2));
            assert_eq!(e.created_at, completed_at);
            assert_eq!(e.amount, outcome.amount);
        }
        assert_eq!(entries[0].account_id, 1);
        assert_eq!(entries[1].account_id, 2);
    }

    #[test]
    fn test_entries_for_credit_single_side() {
        let outcome = TransactionOutcome {
            operation: OperationKind::Credit,
            amount: "20.00".parse().unwrap(),
            from: None,
            to: Some(SideChange {
                account_id: 5,
                before: Balance::zero(),
                after: Balance::new(dec!(20)).unwrap(),
            }),
            completed_at: Utc::now(),
        };

        let entries = entries_for(&outcome, Some("пополнение"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].account_id, 5);
        assert_eq!(entries[0].from_account_id, None);
        assert_eq!(entries[0].to_account_id, Some(5));
        assert!(entries[0].comment.ends_with("; Комментарий: пополнение"));
        assert!(entries[0].comment.chars().count() <= MAX_COMMENT_LEN);
    }
}
