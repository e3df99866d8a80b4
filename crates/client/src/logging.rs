//! File-only tracing setup so log lines never interleave with command output.
use std::path::Path;

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Route logs to `<log_dir>/<session>/client.log`.
///
/// The session defaults to the process start time in seconds.
pub fn setup_logging(log_dir: &Path, session_id: Option<&str>) -> Result<()> {
    let session_id = session_id
        .map(str::to_string)
        .unwrap_or_else(|| format!("session_{}", chrono::Utc::now().timestamp()));

    let session_log_dir = log_dir.join(&session_id);
    std::fs::create_dir_all(&session_log_dir)?;

    let file_appender = tracing_appender::rolling::never(&session_log_dir, "client.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    // Keep the writer alive for the whole process.
    std::mem::forget(guard);
    Ok(())
}
