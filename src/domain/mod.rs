//! Domain types
//!
//! Shared value types and business errors used by the orchestrator,
//! the stores and the HTTP boundary.

mod error;
mod money;
mod operation;

pub use error::DomainError;
pub use money::{Amount, AmountError, Balance};
pub use operation::OperationKind;
