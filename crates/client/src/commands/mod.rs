//! Command implementations for the expense client.
//!
//! Each command owns its CLI args and runs against an assembled [`SyncSetup`](client_bootstrap::SyncSetup).

mod account;
mod expenses;
mod sync;

use std::io::{self, Write};

use anyhow::Result;
use console::style;
use expense_sync::{Event, ModeEvent, Notice, SaveOutcome, SyncEvent};

pub use account::{SignIn, SignOut, Upgrade, UseSession};
pub use expenses::{Add, Budget, Delete, List};
pub use sync::{Flush, Status, Watch, Wipe};

/// Two decimals with a currency sign, e.g. `$1,234.50`.
pub fn format_amount(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}${grouped}.{:02}", cents % 100)
}

pub fn print_outcome(outcome: SaveOutcome) {
    match outcome {
        SaveOutcome::Stored => println!("{}", style("✓ Saved").green().bold()),
        SaveOutcome::Queued => println!(
            "{} {}",
            style("⏳ Saved locally").yellow().bold(),
            style("(will sync when the remote store is reachable)").dim()
        ),
    }
}

/// One line for each event a user should see.
pub fn print_event(event: &Event) {
    match event {
        Event::Notice(notice) => print_notice(notice),
        Event::Mode(ModeEvent { new, old }) => println!(
            "{} storage mode {} → {}",
            style("⚙").cyan(),
            style(old).dim(),
            style(new).cyan().bold()
        ),
        Event::Sync(SyncEvent::RemoteSnapshot {
            expense_count,
            budget,
            ..
        }) => println!(
            "{} remote update: {} expenses, budget {}",
            style("↻").cyan(),
            style(expense_count).bold(),
            style(format_amount(*budget)).bold()
        ),
        Event::Sync(SyncEvent::QueueFlushed(report)) if !report.is_noop() => println!(
            "{} retried {} writes: {} delivered, {} still waiting, {} dropped",
            style("↻").cyan(),
            report.attempted,
            style(report.delivered).green(),
            style(report.requeued).yellow(),
            style(report.dropped).red()
        ),
        Event::Sync(SyncEvent::QueueFlushed(_)) => {}
    }
}

fn print_notice(notice: &Notice) {
    match notice {
        Notice::UpgradeSuggested { user } => println!(
            "{} Signed in as {}. Run {} to keep your expenses across devices.",
            style("ℹ").cyan().bold(),
            style(user).bold(),
            style("expense upgrade").cyan()
        ),
        Notice::SetupRequired { reason } => eprintln!(
            "{} Remote storage needs setup: {}",
            style("✗").red().bold(),
            reason
        ),
        Notice::WriteQueued { key, pending } => println!(
            "{} {} queued for sync ({} pending)",
            style("⏳").yellow(),
            style(key).bold(),
            pending
        ),
        Notice::MigrationCompleted(summary) => println!(
            "{} Moved {} expenses to your account ({} total, budget {})",
            style("✓").green().bold(),
            summary.expense_count,
            summary.total_expenses,
            format_amount(summary.budget)
        ),
        Notice::MigrationFailed { reason } => eprintln!(
            "{} Could not move session data: {}",
            style("✗").red().bold(),
            reason
        ),
    }
}

/// Prompt user for confirmation
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{} ", style(format!("{prompt} [y/N]")).yellow().bold());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "$0.00");
        assert_eq!(format_amount(4.5), "$4.50");
        assert_eq!(format_amount(999.999), "$1,000.00");
        assert_eq!(format_amount(1234567.8), "$1,234,567.80");
        assert_eq!(format_amount(-12.345), "-$12.35");
    }
}
