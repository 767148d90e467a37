//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::store::StoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Баланс счёта не найден")]
    AccountNotFound(i64),

    #[error("Валюта {0} не найдена в ответе API")]
    UnknownCurrency(String),

    #[error("Транзакции по счёту не найдены")]
    NoTransactions(i64),

    #[error("Недопустимое значение ordering: {0}")]
    InvalidOrdering(String),

    // Transient errors (5xx, retryable)
    #[error("Данные о курсах валют временно недоступны")]
    RatesUnavailable,

    #[error("Не удалось заблокировать баланс, повторите запрос")]
    LockTimeout,

    // Server errors (5xx)
    #[error("Storage error: {0}")]
    Store(StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::LockTimeout => AppError::LockTimeout,
            other => AppError::Store(other),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::Domain(domain_err) => {
                (StatusCode::BAD_REQUEST, domain_err.code(), None)
            }
            AppError::UnknownCurrency(code) => {
                (StatusCode::BAD_REQUEST, "unknown_currency", Some(code.clone()))
            }
            AppError::NoTransactions(account_id) => (
                StatusCode::BAD_REQUEST,
                "no_transactions",
                Some(account_id.to_string()),
            ),
            AppError::InvalidOrdering(value) => {
                (StatusCode::BAD_REQUEST, "invalid_ordering", Some(value.clone()))
            }

            // 404 Not Found
            AppError::AccountNotFound(account_id) => (
                StatusCode::NOT_FOUND,
                "account_not_found",
                Some(account_id.to_string()),
            ),

            // 503 Service Unavailable (transient, retryable)
            AppError::RatesUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "rates_unavailable", None)
            }
            AppError::LockTimeout => {
                (StatusCode::SERVICE_UNAVAILABLE, "lock_timeout", None)
            }

            // 500 Internal Server Error
            AppError::Store(e) => {
                tracing::error!("Storage error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
