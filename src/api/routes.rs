//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::domain::{Amount, DomainError, OperationKind};
use crate::error::AppError;
use crate::ledger::{self, EntryOrdering, LedgerEntry};
use crate::orchestrator::{TransactionOrchestrator, TransactionRequest};
use crate::rates::RateLookup;

use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionApiRequest {
    pub operation: String,
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_account_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_account_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionApiResponse {
    pub detail: String,
    /// 2-decimal fixed string: the debited side's balance for debit and
    /// transfer, the credited side's for credit
    pub balance: String,
    /// `DD.MM.YYYY HH:MM:SS`
    pub completed_at: String,
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BalanceApiResponse {
    pub account_id: i64,
    pub balance: String,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub ordering: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LedgerEntryResponse {
    pub id: i64,
    pub account_id: i64,
    pub from_account_id: Option<i64>,
    pub to_account_id: Option<i64>,
    pub balance_before: String,
    pub balance_after: String,
    pub amount: String,
    pub operation: OperationKind,
    pub created_at: String,
    pub comment: String,
}

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            account_id: entry.account_id,
            from_account_id: entry.from_account_id,
            to_account_id: entry.to_account_id,
            balance_before: format!("{:.2}", entry.balance_before),
            balance_after: format!("{:.2}", entry.balance_after),
            amount: format!("{:.2}", entry.amount),
            operation: entry.operation,
            created_at: ledger::format_timestamp(entry.created_at),
            comment: entry.comment,
        }
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/transactions/credit", post(credit))
        .route("/transactions/debit", post(debit))
        .route("/transactions/transfer", post(transfer))
        .route("/accounts/:account_id/balance", get(get_account_balance))
        .route(
            "/accounts/:account_id/transactions",
            get(get_account_transactions),
        )
}

// =========================================================================
// POST /transactions/{credit,debit,transfer}
// =========================================================================

async fn credit(
    State(state): State<AppState>,
    Json(request): Json<TransactionApiRequest>,
) -> Result<Json<TransactionApiResponse>, AppError> {
    handle_transaction(state, OperationKind::Credit, request).await
}

async fn debit(
    State(state): State<AppState>,
    Json(request): Json<TransactionApiRequest>,
) -> Result<Json<TransactionApiResponse>, AppError> {
    handle_transaction(state, OperationKind::Debit, request).await
}

async fn transfer(
    State(state): State<AppState>,
    Json(request): Json<TransactionApiRequest>,
) -> Result<Json<TransactionApiResponse>, AppError> {
    handle_transaction(state, OperationKind::Transfer, request).await
}

/// Shared handling for all three transaction endpoints. The `operation`
/// field must name the endpoint it was posted to.
async fn handle_transaction(
    state: AppState,
    endpoint: OperationKind,
    request: TransactionApiRequest,
) -> Result<Json<TransactionApiResponse>, AppError> {
    let operation: OperationKind = request
        .operation
        .parse()
        .map_err(|_| DomainError::InvalidOperation)?;

    if operation != endpoint {
        return Err(DomainError::OperationEndpointMismatch {
            expected: endpoint.as_str(),
        }
        .into());
    }

    let amount: Amount = request.amount.parse().map_err(DomainError::from)?;

    let orchestrator = TransactionOrchestrator::new(state.store.clone());
    let outcome = orchestrator
        .process(TransactionRequest {
            operation,
            amount,
            from_account_id: request.from_account_id,
            to_account_id: request.to_account_id,
            comment: request.comment,
        })
        .await?;

    Ok(Json(TransactionApiResponse {
        detail: "Операция успешно выполнена".to_string(),
        balance: outcome.primary_balance().to_string(),
        completed_at: outcome.completed_at_display(),
    }))
}

// =========================================================================
// GET /accounts/:account_id/balance
// =========================================================================

/// Get an account balance, optionally converted for display.
/// The native balance never waits on the rate cache.
async fn get_account_balance(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<BalanceApiResponse>, AppError> {
    let balance = state
        .store
        .fetch_balance(account_id)
        .await?
        .ok_or(AppError::AccountNotFound(account_id))?;

    let currency = query
        .currency
        .map(|c| c.to_uppercase())
        .unwrap_or_else(|| state.base_currency.clone());

    let display = if currency == state.base_currency {
        balance.value()
    } else {
        match state.rates.lookup(&currency) {
            RateLookup::Available(rate) => (balance.value() * rate).round_dp(2),
            RateLookup::UnknownCurrency => return Err(AppError::UnknownCurrency(currency)),
            RateLookup::Unavailable => return Err(AppError::RatesUnavailable),
        }
    };

    Ok(Json(BalanceApiResponse {
        account_id,
        balance: format!("{display:.2}"),
        currency,
    }))
}

// =========================================================================
// GET /accounts/:account_id/transactions
// =========================================================================

/// List an account's ledger history, newest first unless the caller picks
/// another ordering. An empty history is reported as a validation error
/// (inherited boundary behavior).
async fn get_account_transactions(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<LedgerEntryResponse>>, AppError> {
    let ordering = match query.ordering {
        Some(raw) => raw
            .parse::<EntryOrdering>()
            .map_err(|_| AppError::InvalidOrdering(raw))?,
        None => EntryOrdering::default(),
    };

    let entries = state.store.list_entries(account_id, ordering).await?;
    if entries.is_empty() {
        return Err(AppError::NoTransactions(account_id));
    }

    Ok(Json(
        entries.into_iter().map(LedgerEntryResponse::from).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_request_deserialize() {
        let json = r#"{
            "operation": "transfer",
            "amount": "100.50",
            "from_account_id": 1,
            "to_account_id": 2,
            "comment": "за обед"
        }"#;

        let request: TransactionApiRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.operation, "transfer");
        assert_eq!(request.amount, "100.50");
        assert_eq!(request.from_account_id, Some(1));
        assert_eq!(request.comment.as_deref(), Some("за обед"));
    }

    #[test]
    fn test_transaction_request_optional_fields_default() {
        let json = r#"{"operation": "credit", "amount": "5", "to_account_id": 3}"#;

        let request: TransactionApiRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.from_account_id, None);
        assert_eq!(request.comment, None);
    }

    #[test]
    fn test_balance_query_currency_optional() {
        let query: BalanceQuery = serde_json::from_str("{}").unwrap();
        assert!(query.currency.is_none());
    }
}
