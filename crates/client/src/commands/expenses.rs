//! Ledger commands: add, list, delete, budget.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use console::style;
use expense_core::{BudgetAlert, Category, ExpenseDraft, ExpenseId};

use client_bootstrap::SyncSetup;

use super::{format_amount, print_outcome};

/// Record a new expense
#[derive(Parser, Debug)]
pub struct Add {
    pub description: String,

    pub amount: f64,

    /// food, transport, shopping, entertainment, bills, health, education, other
    #[arg(short, long, default_value = "other")]
    pub category: Category,

    /// Date of the expense (YYYY-MM-DD, default: today)
    #[arg(short, long)]
    pub date: Option<NaiveDate>,
}

impl Add {
    pub async fn execute(self, setup: &SyncSetup) -> Result<()> {
        let date = self.date.unwrap_or_else(|| Local::now().date_naive());
        let draft = ExpenseDraft::new(self.description, self.amount, self.category, date);

        let (expense, outcome) = setup
            .tracker
            .add_expense(draft)
            .await
            .context("failed to add expense")?;

        println!(
            "{} {} {} {}",
            style("+").green().bold(),
            style(&expense.description).bold(),
            format_amount(expense.amount),
            style(format!("[{}] #{}", expense.category.label(), expense.id)).dim()
        );
        print_outcome(outcome);
        print_budget_alert(setup);
        Ok(())
    }
}

/// List expenses, newest first
#[derive(Parser, Debug)]
pub struct List {
    /// Only show one category
    #[arg(short, long)]
    pub category: Option<Category>,

    /// Show per-category totals instead of individual expenses
    #[arg(long)]
    pub totals: bool,
}

impl List {
    pub fn execute(self, setup: &SyncSetup) -> Result<()> {
        let ledger = setup.tracker.snapshot();

        if self.totals {
            for (category, total) in ledger.category_totals() {
                println!(
                    "  {:<14} {:>12}",
                    category.label(),
                    style(format_amount(total)).bold()
                );
            }
        } else {
            let expenses: Vec<_> = match self.category {
                Some(category) => ledger.filter_by_category(category),
                None => ledger.expenses().iter().collect(),
            };
            if expenses.is_empty() {
                println!("{}", style("No expenses yet").dim());
            }
            for expense in expenses {
                println!(
                    "  {} {:<28} {:>12} {}",
                    style(expense.date).dim(),
                    expense.description,
                    format_amount(expense.amount),
                    style(format!("[{}] #{}", expense.category.label(), expense.id)).dim()
                );
            }
        }

        println!();
        println!(
            "Spent {} of {} ({} left)",
            style(format_amount(ledger.total_spent())).bold(),
            style(format_amount(ledger.budget())).bold(),
            format_amount(ledger.remaining())
        );
        Ok(())
    }
}

/// Delete an expense by id
#[derive(Parser, Debug)]
pub struct Delete {
    pub id: ExpenseId,
}

impl Delete {
    pub async fn execute(self, setup: &SyncSetup) -> Result<()> {
        match setup.tracker.delete_expense(self.id).await? {
            Some(outcome) => {
                println!("{} #{}", style("-").red().bold(), self.id);
                print_outcome(outcome);
            }
            None => anyhow::bail!("no expense with id {}", self.id),
        }
        Ok(())
    }
}

/// Set the monthly budget
#[derive(Parser, Debug)]
pub struct Budget {
    pub amount: f64,
}

impl Budget {
    pub async fn execute(self, setup: &SyncSetup) -> Result<()> {
        let outcome = setup.tracker.set_budget(self.amount).await?;
        println!("Budget set to {}", style(format_amount(self.amount)).bold());
        print_outcome(outcome);
        print_budget_alert(setup);
        Ok(())
    }
}

fn print_budget_alert(setup: &SyncSetup) {
    match setup.tracker.snapshot().budget_alert() {
        BudgetAlert::None => {}
        BudgetAlert::Warning { percent } => println!(
            "{} {:.0}% of the budget is spent",
            style("⚠").yellow().bold(),
            percent
        ),
        BudgetAlert::Exceeded { percent } => println!(
            "{} Over budget ({:.0}% spent)",
            style("✗").red().bold(),
            percent
        ),
    }
}
