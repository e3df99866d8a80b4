//! Platform-specific directory utilities.

use std::path::PathBuf;

const APP_NAME: &str = "expense-tracker";

/// Platform data directory for durable local storage.
///
/// - macOS: `~/Library/Application Support/expense-tracker`
/// - Linux: `~/.local/share/expense-tracker` (or `$XDG_DATA_HOME/expense-tracker`)
/// - Windows: `%APPDATA%\expense-tracker`
/// - Fallback: `./expense_data`
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./expense_data"))
}

/// Platform cache directory for log files.
///
/// Fallback: `/tmp/expense-tracker/logs`
pub fn log_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.cache_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("/tmp").join(APP_NAME).join("logs"))
}
