//! Domain Error Types
//!
//! Pure business-rule errors, independent of the web and storage layers.
//! Display strings are the localized messages surfaced to API clients.

use rust_decimal::Decimal;
use thiserror::Error;

use super::AmountError;

/// Business rule violations detected by the orchestrator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Debit or transfer source does not hold enough funds
    #[error("Недостаточно средств")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    /// Transfer where source and target are the same account
    #[error("Нельзя переводить средства самому себе")]
    SelfTransfer,

    /// Credit without a target account
    #[error("Поле to_account_id обязательно для зачисления")]
    MissingTargetAccount,

    /// Debit without a source account
    #[error("Поле from_account_id обязательно для списания")]
    MissingSourceAccount,

    /// Transfer without both accounts
    #[error("Для перевода необходимо указать from_account_id и to_account_id")]
    MissingTransferAccounts,

    /// Operation name outside the closed credit/debit/transfer set
    #[error("Недопустимая операция")]
    InvalidOperation,

    /// Operation does not match the endpoint it was posted to
    #[error("Недопустимая операция для transactions/{expected}/")]
    OperationEndpointMismatch { expected: &'static str },

    /// User comment would push the generated ledger comment past its limit
    #[error("Комментарий превышает {max} символов")]
    CommentTooLong { max: usize, got: usize },

    /// Malformed or out-of-range amount
    #[error("Некорректная сумма: {0}")]
    InvalidAmount(#[from] AmountError),
}

impl DomainError {
    /// Stable machine-readable code for the error response body
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InsufficientFunds { .. } => "insufficient_funds",
            DomainError::SelfTransfer => "self_transfer",
            DomainError::MissingTargetAccount
            | DomainError::MissingSourceAccount
            | DomainError::MissingTransferAccounts => "missing_counterparty",
            DomainError::InvalidOperation | DomainError::OperationEndpointMismatch { .. } => {
                "invalid_operation"
            }
            DomainError::CommentTooLong { .. } => "comment_too_long",
            DomainError::InvalidAmount(_) => "invalid_amount",
        }
    }
}
