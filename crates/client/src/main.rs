//! Expense tracker client binary.
//!
//! Composition root: loads configuration, assembles the storage layer through
//! [`client_bootstrap::SyncBuilder`], applies the remembered sign-in state, and
//! runs a single command against it.
//!
//! ```bash
//! expense add "Coffee" 4.50 --category food
//! expense sign-in
//! expense status
//! ```

mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use client_bootstrap::{SyncBuilder, SyncConfig, dirs};
use expense_sync::Topic;

use commands::{
    Add, Budget, Delete, Flush, List, SignIn, SignOut, Status, Upgrade, UseSession, Watch, Wipe,
};

/// Track expenses locally or synced to your account
#[derive(Parser)]
#[command(name = "expense")]
#[command(about = "Expense tracker with session and synced storage", long_about = None)]
#[command(version)]
struct Cli {
    /// Log session name (default: timestamp)
    #[arg(long, global = true)]
    log_session: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Record a new expense
    Add(Add),

    /// List expenses, newest first
    List(List),

    /// Delete an expense by id
    Delete(Delete),

    /// Set the monthly budget
    Budget(Budget),

    /// Show storage mode, account, and sync state
    Status(Status),

    /// Sign in with the configured identity
    SignIn(SignIn),

    /// Sign out and fall back to session storage
    SignOut(SignOut),

    /// Switch to synced storage, migrating session data
    Upgrade(Upgrade),

    /// Switch back to session storage
    UseSession(UseSession),

    /// Retry writes that are waiting for the remote store
    Flush(Flush),

    /// Delete all synced data for the signed-in account
    Wipe(Wipe),

    /// Follow remote changes and retry queued writes until Ctrl-C
    Watch(Watch),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    logging::setup_logging(&dirs::log_dir(), cli.log_session.as_deref())?;
    tracing::info!("Starting expense client");
    tracing::info!("Data directory: {}", config.resolved_data_dir().display());
    tracing::info!("Remote directory: {:?}", config.remote_dir);

    let setup = SyncBuilder::new(config).build()?;
    let mut notices = setup.events.subscribe(Topic::Notice);
    let transition = setup.start().await;
    tracing::debug!(?transition, "startup auth state applied");

    let result = match cli.command {
        Command::Add(cmd) => cmd.execute(&setup).await,
        Command::List(cmd) => cmd.execute(&setup),
        Command::Delete(cmd) => cmd.execute(&setup).await,
        Command::Budget(cmd) => cmd.execute(&setup).await,
        Command::Status(cmd) => cmd.execute(&setup).await,
        Command::SignIn(cmd) => cmd.execute(&setup).await,
        Command::SignOut(cmd) => cmd.execute(&setup).await,
        Command::Upgrade(cmd) => cmd.execute(&setup).await,
        Command::UseSession(cmd) => cmd.execute(&setup).await,
        Command::Flush(cmd) => cmd.execute(&setup).await,
        Command::Wipe(cmd) => cmd.execute(&setup).await,
        Command::Watch(cmd) => return cmd.execute(&setup).await,
    };

    while let Ok(event) = notices.try_recv() {
        commands::print_event(&event);
    }
    result
}
