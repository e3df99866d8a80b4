//! Domain model for the expense tracker.
//!
//! This crate holds the data that the storage layer moves around and the
//! in-memory [`Ledger`] the application mutates. It performs no I/O; the
//! `expense-sync` crate decides where these values live.
//!
//! Modules are organized by responsibility:
//! - [`expense`] defines expense records, drafts, and id generation
//! - [`category`] defines the closed set of spending categories
//! - [`identity`] carries the opaque authenticated-user handle
//! - [`ledger`] is the application's in-memory view of expenses and budget
pub mod category;
pub mod error;
pub mod expense;
pub mod identity;
pub mod ledger;

pub use category::Category;
pub use error::{LedgerError, Result};
pub use expense::{Expense, ExpenseDraft, ExpenseId, ExpenseIdGenerator};
pub use identity::UserIdentity;
pub use ledger::{BudgetAlert, Ledger};
