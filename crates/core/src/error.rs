//! Validation errors raised when building domain values.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("expense description must not be empty")]
    EmptyDescription,

    #[error("expense amount must be a finite non-negative number, got {0}")]
    InvalidAmount(f64),

    #[error("budget must be a finite non-negative number, got {0}")]
    InvalidBudget(f64),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
