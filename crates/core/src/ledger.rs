//! In-memory ledger the application renders from.
//!
//! The ledger is deliberately dumb about persistence: the tracker facade in
//! `expense-sync` saves it after every mutation, and the sync bridge replaces
//! its contents wholesale when the remote document changes.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::category::Category;
use crate::error::{LedgerError, Result};
use crate::expense::{Expense, ExpenseDraft, ExpenseId, ExpenseIdGenerator};

/// Fraction of the budget at which a warning is raised.
const WARNING_RATIO: f64 = 0.8;

/// Budget usage level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BudgetAlert {
    /// No budget set, or spending under the warning threshold
    None,
    /// At least 80% of the budget is spent
    Warning { percent: f64 },
    /// Spending reached or passed the budget
    Exceeded { percent: f64 },
}

/// Expenses (newest first) and the monthly budget.
#[derive(Debug, Default)]
pub struct Ledger {
    expenses: Vec<Expense>,
    budget: f64,
    ids: ExpenseIdGenerator,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger from stored values.
    pub fn with_data(expenses: Vec<Expense>, budget: f64) -> Self {
        let mut ledger = Self::new();
        ledger.replace(expenses, budget);
        ledger
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    /// Record a new expense at the front of the list.
    pub fn add(&mut self, draft: ExpenseDraft) -> Result<Expense> {
        let now = Utc::now();
        let id = self.ids.next_id(now);
        let expense = Expense::from_draft(draft, id, now)?;
        self.expenses.insert(0, expense.clone());
        Ok(expense)
    }

    /// Remove an expense by id. Returns whether anything was removed.
    pub fn delete(&mut self, id: ExpenseId) -> bool {
        let before = self.expenses.len();
        self.expenses.retain(|expense| expense.id != id);
        self.expenses.len() != before
    }

    pub fn clear(&mut self) {
        self.expenses.clear();
    }

    pub fn set_budget(&mut self, amount: f64) -> Result<()> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(LedgerError::InvalidBudget(amount));
        }
        self.budget = amount;
        Ok(())
    }

    /// Swap in a complete snapshot (remote convergence or a reload).
    ///
    /// Invalid budgets collapse to zero rather than failing.
    pub fn replace(&mut self, expenses: Vec<Expense>, budget: f64) {
        for expense in &expenses {
            self.ids.observe(expense.id);
        }
        self.expenses = expenses;
        self.budget = if budget.is_finite() && budget >= 0.0 {
            budget
        } else {
            0.0
        };
    }

    pub fn total_spent(&self) -> f64 {
        self.expenses.iter().map(|expense| expense.amount).sum()
    }

    pub fn remaining(&self) -> f64 {
        self.budget - self.total_spent()
    }

    pub fn filter_by_category(&self, category: Category) -> Vec<&Expense> {
        self.expenses
            .iter()
            .filter(|expense| expense.category == category)
            .collect()
    }

    /// Total spent per category, omitting categories with no expenses.
    pub fn category_totals(&self) -> BTreeMap<Category, f64> {
        let mut totals = BTreeMap::new();
        for expense in &self.expenses {
            *totals.entry(expense.category).or_insert(0.0) += expense.amount;
        }
        totals
    }

    pub fn budget_alert(&self) -> BudgetAlert {
        if self.budget <= 0.0 {
            return BudgetAlert::None;
        }

        let ratio = self.total_spent() / self.budget;
        let percent = ratio * 100.0;
        if ratio >= 1.0 {
            BudgetAlert::Exceeded { percent }
        } else if ratio >= WARNING_RATIO {
            BudgetAlert::Warning { percent }
        } else {
            BudgetAlert::None
        }
    }
}
