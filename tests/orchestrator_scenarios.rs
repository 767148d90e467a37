//! Transaction orchestration scenarios against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;

use balance_api::domain::{DomainError, OperationKind};
use balance_api::error::AppError;
use balance_api::ledger::EntryOrdering;
use balance_api::orchestrator::{TransactionOrchestrator, TransactionRequest};
use balance_api::store::{BalanceStore, MemoryBalanceStore};

fn orchestrator(store: &MemoryBalanceStore) -> TransactionOrchestrator {
    TransactionOrchestrator::new(Arc::new(store.clone()))
}

fn request(
    operation: OperationKind,
    amount: &str,
    from: Option<i64>,
    to: Option<i64>,
) -> TransactionRequest {
    TransactionRequest {
        operation,
        amount: amount.parse().unwrap(),
        from_account_id: from,
        to_account_id: to,
        comment: None,
    }
}

/// Credit an account so a scenario starts from a known balance
async fn seed(store: &MemoryBalanceStore, account_id: i64, amount: &str) {
    orchestrator(store)
        .process(request(OperationKind::Credit, amount, None, Some(account_id)))
        .await
        .unwrap();
}

#[tokio::test]
async fn credit_unseen_account_creates_it_from_zero() {
    let store = MemoryBalanceStore::new();

    let outcome = orchestrator(&store)
        .process(request(OperationKind::Credit, "20.00", None, Some(5)))
        .await
        .unwrap();

    let to = outcome.to.unwrap();
    assert_eq!(to.before.value(), dec!(0));
    assert_eq!(to.after.value(), dec!(20.00));
    assert!(outcome.from.is_none());
    assert_eq!(outcome.primary_balance().to_string(), "20.00");

    let entries = store.list_entries(5, EntryOrdering::IdAsc).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].balance_before, dec!(0));
    assert_eq!(entries[0].balance_after, dec!(20.00));
    assert_eq!(entries[0].from_account_id, None);
    assert_eq!(entries[0].to_account_id, Some(5));
}

#[tokio::test]
async fn debit_reduces_balance_and_records_one_entry() {
    let store = MemoryBalanceStore::new();
    seed(&store, 1, "100.00").await;

    let outcome = orchestrator(&store)
        .process(request(OperationKind::Debit, "50.00", Some(1), None))
        .await
        .unwrap();

    let from = outcome.from.unwrap();
    assert_eq!(from.before.value(), dec!(100.00));
    assert_eq!(from.after.value(), dec!(50.00));
    assert_eq!(outcome.primary_balance().to_string(), "50.00");

    let entries = store.list_entries(1, EntryOrdering::IdAsc).await.unwrap();
    assert_eq!(entries.len(), 2); // seed credit + debit
    let debit = &entries[1];
    assert_eq!(debit.operation, OperationKind::Debit);
    assert_eq!(debit.balance_before, dec!(100.00));
    assert_eq!(debit.balance_after, dec!(50.00));
}

#[tokio::test]
async fn transfer_to_unseen_account_creates_it() {
    let store = MemoryBalanceStore::new();
    seed(&store, 1, "100.00").await;

    let outcome = orchestrator(&store)
        .process(request(OperationKind::Transfer, "50.00", Some(1), Some(2)))
        .await
        .unwrap();

    assert_eq!(outcome.from.unwrap().after.value(), dec!(50.00));
    let to = outcome.to.unwrap();
    assert_eq!(to.before.value(), dec!(0));
    assert_eq!(to.after.value(), dec!(50.00));

    let from_entries = store.list_entries(1, EntryOrdering::IdAsc).await.unwrap();
    let to_entries = store.list_entries(2, EntryOrdering::IdAsc).await.unwrap();
    assert_eq!(from_entries.len(), 2);
    assert_eq!(to_entries.len(), 1);
}

#[tokio::test]
async fn transfer_entries_mirror_each_other() {
    let store = MemoryBalanceStore::new();
    seed(&store, 1, "100.00").await;

    orchestrator(&store)
        .process(request(OperationKind::Transfer, "30.00", Some(1), Some(2)))
        .await
        .unwrap();

    let from_entry = store.list_entries(1, EntryOrdering::IdAsc).await.unwrap()[1].clone();
    let to_entry = store.list_entries(2, EntryOrdering::IdAsc).await.unwrap()[0].clone();

    assert_eq!(from_entry.amount, to_entry.amount);
    assert_eq!(from_entry.created_at, to_entry.created_at);
    assert_eq!(from_entry.from_account_id, Some(1));
    assert_eq!(from_entry.to_account_id, Some(2));
    assert_eq!(to_entry.from_account_id, Some(1));
    assert_eq!(to_entry.to_account_id, Some(2));
    assert_eq!(from_entry.operation, OperationKind::Transfer);
    assert_eq!(to_entry.operation, OperationKind::Transfer);
}

#[tokio::test]
async fn transfer_conserves_total_funds() {
    let store = MemoryBalanceStore::new();
    seed(&store, 1, "70.00").await;
    seed(&store, 2, "30.00").await;

    let outcome = orchestrator(&store)
        .process(request(OperationKind::Transfer, "12.34", Some(1), Some(2)))
        .await
        .unwrap();

    let from = outcome.from.unwrap();
    let to = outcome.to.unwrap();
    assert_eq!(
        from.before.value() + to.before.value(),
        from.after.value() + to.after.value()
    );
}

#[tokio::test]
async fn insufficient_funds_leaves_state_untouched() {
    let store = MemoryBalanceStore::new();
    seed(&store, 1, "100.00").await;

    let err = orchestrator(&store)
        .process(request(OperationKind::Debit, "150.00", Some(1), None))
        .await
        .unwrap_err();

    match err {
        AppError::Domain(DomainError::InsufficientFunds { required, available }) => {
            assert_eq!(required, dec!(150.00));
            assert_eq!(available, dec!(100.00));
        }
        other => panic!("Expected InsufficientFunds, got: {:?}", other),
    }

    let balance = store.fetch_balance(1).await.unwrap().unwrap();
    assert_eq!(balance.value(), dec!(100.00));

    let entries = store.list_entries(1, EntryOrdering::IdAsc).await.unwrap();
    assert_eq!(entries.len(), 1); // only the seed credit
}

#[tokio::test]
async fn insufficient_transfer_mutates_neither_side() {
    let store = MemoryBalanceStore::new();
    seed(&store, 1, "10.00").await;
    seed(&store, 2, "5.00").await;

    let err = orchestrator(&store)
        .process(request(OperationKind::Transfer, "10.01", Some(1), Some(2)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Domain(DomainError::InsufficientFunds { .. })
    ));

    assert_eq!(
        store.fetch_balance(1).await.unwrap().unwrap().value(),
        dec!(10.00)
    );
    assert_eq!(
        store.fetch_balance(2).await.unwrap().unwrap().value(),
        dec!(5.00)
    );
    assert_eq!(store.list_entries(2, EntryOrdering::IdAsc).await.unwrap().len(), 1);
}

#[tokio::test]
async fn debit_of_unknown_account_is_not_found() {
    let store = MemoryBalanceStore::new();

    let err = orchestrator(&store)
        .process(request(OperationKind::Debit, "1.00", Some(404), None))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AccountNotFound(404)));
}

#[tokio::test]
async fn self_transfer_rejected_before_any_lock() {
    let store = MemoryBalanceStore::new();
    seed(&store, 1, "100.00").await;

    for amount in ["0.01", "100.00", "9999999999.99"] {
        let err = orchestrator(&store)
            .process(request(OperationKind::Transfer, amount, Some(1), Some(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Domain(DomainError::SelfTransfer)));
    }

    // No mutation, no audit trail beyond the seed
    assert_eq!(store.list_entries(1, EntryOrdering::IdAsc).await.unwrap().len(), 1);
}

#[tokio::test]
async fn credit_then_debit_round_trip_chains_balances() {
    let store = MemoryBalanceStore::new();
    seed(&store, 1, "100.00").await;

    orchestrator(&store)
        .process(request(OperationKind::Credit, "25.50", None, Some(1)))
        .await
        .unwrap();
    orchestrator(&store)
        .process(request(OperationKind::Debit, "25.50", Some(1), None))
        .await
        .unwrap();

    let balance = store.fetch_balance(1).await.unwrap().unwrap();
    assert_eq!(balance.value(), dec!(100.00));

    let entries = store.list_entries(1, EntryOrdering::IdAsc).await.unwrap();
    assert_eq!(entries.len(), 3);

    let credit = &entries[1];
    let debit = &entries[2];
    assert_eq!(credit.balance_before, dec!(100.00));
    assert_eq!(credit.balance_after, dec!(125.50));
    assert_eq!(debit.balance_before, credit.balance_after);
    assert_eq!(debit.balance_after, dec!(100.00));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_operations_on_disjoint_accounts_all_commit() {
    let store = MemoryBalanceStore::new();

    let mut handles = Vec::new();
    for account_id in 1..=8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            orchestrator(&store)
                .process(request(OperationKind::Credit, "10.00", None, Some(account_id)))
                .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for account_id in 1..=8 {
        let balance = store.fetch_balance(account_id).await.unwrap().unwrap();
        assert_eq!(balance.value(), dec!(10.00));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_debits_never_overdraw() {
    let store = MemoryBalanceStore::new();
    seed(&store, 1, "5.00").await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            orchestrator(&store)
                .process(request(OperationKind::Debit, "1.00", Some(1), None))
                .await
        }));
    }

    let mut committed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(AppError::Domain(DomainError::InsufficientFunds { .. })) => rejected += 1,
            Err(other) => panic!("Unexpected error: {:?}", other),
        }
    }

    assert_eq!(committed, 5);
    assert_eq!(rejected, 15);

    let balance = store.fetch_balance(1).await.unwrap().unwrap();
    assert_eq!(balance.value(), dec!(0));

    // Exactly one entry per committed debit, plus the seed
    let entries = store.list_entries(1, EntryOrdering::IdAsc).await.unwrap();
    assert_eq!(entries.len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_direction_transfers_do_not_deadlock() {
    let store = MemoryBalanceStore::new();
    seed(&store, 1, "100.00").await;
    seed(&store, 2, "100.00").await;

    let run = async {
        for _ in 0..25 {
            let store_a = store.clone();
            let store_b = store.clone();

            let forward = tokio::spawn(async move {
                orchestrator(&store_a)
                    .process(request(OperationKind::Transfer, "10.00", Some(1), Some(2)))
                    .await
            });
            let backward = tokio::spawn(async move {
                orchestrator(&store_b)
                    .process(request(OperationKind::Transfer, "10.00", Some(2), Some(1)))
                    .await
            });

            forward.await.unwrap().unwrap();
            backward.await.unwrap().unwrap();
        }
    };

    // Canonical lock ordering makes this complete well within the deadline
    tokio::time::timeout(Duration::from_secs(30), run)
        .await
        .expect("transfers deadlocked");

    let total = store.fetch_balance(1).await.unwrap().unwrap().value()
        + store.fetch_balance(2).await.unwrap().unwrap().value();
    assert_eq!(total, dec!(200.00));
}

#[tokio::test]
async fn completed_at_uses_fixed_display_format() {
    let store = MemoryBalanceStore::new();

    let outcome = orchestrator(&store)
        .process(request(OperationKind::Credit, "1.00", None, Some(1)))
        .await
        .unwrap();

    let display = outcome.completed_at_display();
    assert!(
        chrono::NaiveDateTime::parse_from_str(&display, "%d.%m.%Y %H:%M:%S").is_ok(),
        "bad timestamp format: {display}"
    );
}

#[tokio::test]
async fn user_comment_lands_in_generated_ledger_comment() {
    let store = MemoryBalanceStore::new();

    let mut req = request(OperationKind::Credit, "10.00", None, Some(1));
    req.comment = Some("стипендия".to_string());
    orchestrator(&store).process(req).await.unwrap();

    let entries = store.list_entries(1, EntryOrdering::IdAsc).await.unwrap();
    let comment = &entries[0].comment;
    assert!(comment.starts_with("Зачисление на сумму 10.00; Баланс: 10.00"));
    assert!(comment.ends_with("; Комментарий: стипендия"));
}
