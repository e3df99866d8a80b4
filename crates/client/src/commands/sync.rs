//! Sync inspection and maintenance commands.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use expense_sync::Topic;
use tokio::sync::broadcast::error::RecvError;

use client_bootstrap::SyncSetup;

use super::{confirm, format_amount, print_event};

/// Show storage mode, account, and sync state
#[derive(Parser, Debug)]
pub struct Status {
    /// List writes waiting for the remote store
    #[arg(long)]
    pub pending: bool,
}

impl Status {
    pub async fn execute(self, setup: &SyncSetup) -> Result<()> {
        let info = setup.controller.storage_info();
        let connection = setup.controller.connection_status();
        let summary = setup.controller.data_summary().await;

        println!("{}", style("Storage").cyan().bold());
        println!("  Mode:     {}", style(info.mode).bold());
        println!(
            "  Account:  {}",
            info.user_name
                .as_deref()
                .map(|name| style(name.to_string()).bold())
                .unwrap_or_else(|| style("signed out".to_string()).dim())
        );
        println!(
            "  Data:     {} expenses, {} spent, budget {}",
            summary.expense_count,
            format_amount(summary.total_spent),
            format_amount(summary.budget)
        );

        println!("{}", style("Sync").cyan().bold());
        let reachable = match connection.reachable() {
            Some(true) => style("reachable").green(),
            Some(false) => style("unreachable").red(),
            None => style("not contacted").dim(),
        };
        println!("  Remote:   {reachable}");
        if let Some(at) = connection.last_remote_ok {
            println!("  Last ok:  {}", style(at.to_rfc3339()).dim());
        }
        if let Some(err) = &connection.last_error {
            println!("  Error:    {}", style(err).red());
        }
        println!("  Pending:  {}", connection.pending_writes);

        if self.pending {
            for write in setup.controller.pending_snapshot() {
                println!(
                    "    {} {} for {} {}",
                    style("→").cyan(),
                    style(write.key).bold(),
                    write.user_id,
                    style(format!("(queued {})", write.queued_at.to_rfc3339())).dim()
                );
            }
        }
        Ok(())
    }
}

/// Retry writes that are waiting for the remote store
#[derive(Parser, Debug)]
pub struct Flush;

impl Flush {
    pub async fn execute(self, setup: &SyncSetup) -> Result<()> {
        if setup.controller.pending_writes() == 0 {
            println!("{}", style("Nothing to sync").dim());
            return Ok(());
        }
        let report = setup.controller.flush_pending().await;
        println!(
            "{} delivered, {} still waiting, {} dropped",
            style(report.delivered).green().bold(),
            style(report.requeued).yellow().bold(),
            style(report.dropped).red().bold()
        );
        Ok(())
    }
}

/// Delete all synced data for the signed-in account
#[derive(Parser, Debug)]
pub struct Wipe {
    /// Also clear every local copy (session and durable)
    #[arg(long)]
    pub local: bool,

    /// Skip confirmation prompt (dangerous!)
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl Wipe {
    pub async fn execute(self, setup: &SyncSetup) -> Result<()> {
        let Some(user) = setup.controller.current_user() else {
            anyhow::bail!("sign in first (expense sign-in)");
        };

        println!("{}", style("Delete synced data").yellow().bold());
        println!("The following will be deleted:");
        println!(
            "  {} remote document for {}",
            style("→").cyan(),
            style(user.label()).bold()
        );
        if self.local {
            println!("  {} all local copies", style("→").cyan());
        }
        println!();

        if !self.yes && !confirm("Proceed?")? {
            println!("{}", style("Cancelled").dim());
            return Ok(());
        }

        print!("Deleting remote data... ");
        io::stdout().flush()?;
        setup
            .controller
            .wipe_remote()
            .await
            .context("failed to delete remote data")?;
        println!("{}", style("✓").green());

        if self.local {
            setup.controller.clear_local_data();
        }
        setup.tracker.reload().await;
        Ok(())
    }
}

/// Follow remote changes and retry queued writes until Ctrl-C
#[derive(Parser, Debug)]
pub struct Watch;

impl Watch {
    pub async fn execute(self, setup: &SyncSetup) -> Result<()> {
        let mut sync = setup.events.subscribe(Topic::Sync);
        let mut notices = setup.events.subscribe(Topic::Notice);
        let mut modes = setup.events.subscribe(Topic::Mode);
        let workers = setup.spawn_workers();

        println!(
            "{} {}",
            style("Watching for changes").cyan().bold(),
            style("(Ctrl-C to stop)").dim()
        );

        loop {
            let received = tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = sync.recv() => event,
                event = notices.recv() => event,
                event = modes.recv() => event,
            };
            match received {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watch output lagged behind events");
                }
                Err(RecvError::Closed) => break,
            }
        }

        workers.abort();
        Ok(())
    }
}
