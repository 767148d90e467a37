//! Operation kinds
//!
//! The closed set of ledger operations. The localized label lives here so the
//! HTTP choice list and the comment formatter can never diverge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a balance operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Credit,
    Debit,
    Transfer,
}

impl OperationKind {
    /// Wire name, as accepted in requests and stored in ledger_entries.operation
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Credit => "credit",
            OperationKind::Debit => "debit",
            OperationKind::Transfer => "transfer",
        }
    }

    /// Localized noun used in generated ledger comments
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::Credit => "Зачисление",
            OperationKind::Debit => "Списание",
            OperationKind::Transfer => "Перевод",
        }
    }

    /// True when the operation removes funds from a source account
    pub fn debits_source(&self) -> bool {
        matches!(self, OperationKind::Debit | OperationKind::Transfer)
    }

    /// True when the operation adds funds to a target account
    pub fn credits_target(&self) -> bool {
        matches!(self, OperationKind::Credit | OperationKind::Transfer)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(OperationKind::Credit),
            "debit" => Ok(OperationKind::Debit),
            "transfer" => Ok(OperationKind::Transfer),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for kind in [
            OperationKind::Credit,
            OperationKind::Debit,
            OperationKind::Transfer,
        ] {
            assert_eq!(kind.as_str().parse::<OperationKind>(), Ok(kind));
        }
        assert!("deposit".parse::<OperationKind>().is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(OperationKind::Credit.label(), "Зачисление");
        assert_eq!(OperationKind::Debit.label(), "Списание");
        assert_eq!(OperationKind::Transfer.label(), "Перевод");
    }

    #[test]
    fn test_side_predicates() {
        assert!(!OperationKind::Credit.debits_source());
        assert!(OperationKind::Credit.credits_target());
        assert!(OperationKind::Debit.debits_source());
        assert!(!OperationKind::Debit.credits_target());
        assert!(OperationKind::Transfer.debits_source());
        assert!(OperationKind::Transfer.credits_target());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&OperationKind::Transfer).unwrap();
        assert_eq!(json, r#""transfer""#);

        let kind: OperationKind = serde_json::from_str(r#""debit""#).unwrap();
        assert_eq!(kind, OperationKind::Debit);
    }
}
