//! Comment Formatter
//!
//! Deterministic, localized description of one side of a completed operation.
//! Pure function of its inputs so the same outcome always renders the same.

use crate::domain::{Amount, Balance, OperationKind};

/// Generate the stored ledger comment.
///
/// Format: `<label> на сумму <amount>; Баланс: <balance_after>; Время
/// исполнения: <completed_at>`, with `; Комментарий: <user_comment>` appended
/// when the caller supplied one.
pub fn generate(
    operation: OperationKind,
    amount: Amount,
    balance_after: Balance,
    completed_at: &str,
    user_comment: Option<&str>,
) -> String {
    let mut comment = format!(
        "{} на сумму {}; Баланс: {}; Время исполнения: {}",
        operation.label(),
        amount,
        balance_after,
        completed_at
    );

    if let Some(user_comment) = user_comment.filter(|c| !c.is_empty()) {
        comment.push_str("; Комментарий: ");
        comment.push_str(user_comment);
    }

    comment
}
