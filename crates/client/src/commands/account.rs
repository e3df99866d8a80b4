//! Sign-in state and storage mode commands.

use anyhow::Result;
use clap::Parser;
use console::style;
use expense_sync::{AuthProvider, AuthTransition};

use client_bootstrap::SyncSetup;

use super::{confirm, format_amount};

/// Sign in with the configured identity
#[derive(Parser, Debug)]
pub struct SignIn;

impl SignIn {
    pub async fn execute(self, setup: &SyncSetup) -> Result<()> {
        let user = setup.provider.sign_in().await?;
        let label = user.label().to_string();

        match setup.session.handle_auth_change(Some(user)).await {
            AuthTransition::Unchanged => {
                println!("Already signed in as {}", style(label).bold());
            }
            AuthTransition::SignedIn { migrated, .. } => {
                println!("{} Signed in as {}", style("✓").green().bold(), style(label).bold());
                if let Some(summary) = migrated {
                    println!(
                        "{}",
                        style(format!(
                            "Moved {} session expense(s) to your account ({} total)",
                            summary.expense_count, summary.total_expenses
                        ))
                        .dim()
                    );
                }
            }
            AuthTransition::SignedOut => {}
        }
        Ok(())
    }
}

/// Sign out and fall back to session storage
#[derive(Parser, Debug)]
pub struct SignOut;

impl SignOut {
    pub async fn execute(self, setup: &SyncSetup) -> Result<()> {
        setup.provider.sign_out().await?;
        if setup.session.handle_auth_change(None).await == AuthTransition::SignedOut {
            println!("{}", style("✓ Signed out").green().bold());
        } else {
            println!("{}", style("Not signed in").dim());
        }
        Ok(())
    }
}

/// Switch to synced storage, migrating session data
#[derive(Parser, Debug)]
pub struct Upgrade {
    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl Upgrade {
    pub async fn execute(self, setup: &SyncSetup) -> Result<()> {
        let controller = &setup.controller;
        if controller.mode().is_persistent() {
            println!("{}", style("Already using synced storage").dim());
            return Ok(());
        }
        if controller.current_user().is_none() {
            anyhow::bail!("sign in first (expense sign-in)");
        }

        let summary = controller.data_summary().await;
        println!("{}", style("Switch to synced storage").yellow().bold());
        println!(
            "  {} {} expenses ({}) will move to your account",
            style("→").cyan(),
            style(summary.expense_count).bold(),
            format_amount(summary.total_spent)
        );
        if !self.yes && !confirm("Proceed?")? {
            println!("{}", style("Cancelled").dim());
            return Ok(());
        }

        match setup.session.enable_persistent_storage().await? {
            Some(summary) => println!(
                "{} {} expenses synced",
                style("✓").green().bold(),
                summary.total_expenses
            ),
            None => println!("{}", style("✓ Using synced storage").green().bold()),
        }
        Ok(())
    }
}

/// Switch back to session storage
#[derive(Parser, Debug)]
pub struct UseSession;

impl UseSession {
    pub async fn execute(self, setup: &SyncSetup) -> Result<()> {
        setup.session.use_session_storage().await;
        println!(
            "{} {}",
            style("✓ Using session storage").green().bold(),
            style("(synced data stays in your account)").dim()
        );
        Ok(())
    }
}
