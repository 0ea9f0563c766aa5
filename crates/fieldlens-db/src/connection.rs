//! Database connection management.
//!
//! Opens a `SQLx` `SQLite` pool for the cache file, creating the file and its
//! parent directory on first use.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const IN_MEMORY: &str = ":memory:";

/// Open a connection pool at `path` (or `:memory:`).
///
/// # Errors
/// Returns `DatabaseError` if:
/// - The path is not valid UTF-8
/// - The parent directory cannot be created
/// - `SQLite` refuses the connection
pub async fn connect(path: impl AsRef<Path>) -> Result<Pool<Sqlite>> {
    let path = path.as_ref();
    let path_str = path
        .to_str()
        .ok_or_else(|| DatabaseError::Open("invalid database path: not valid UTF-8".to_string()))?;

    if path_str == IN_MEMORY {
        return connect_in_memory().await;
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let connect_options = SqliteConnectOptions::from_str(path_str)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Open(format!("failed to initialize pool: {e}")))?;

    tracing::info!("Cache database pool created at {}", path_str);
    Ok(pool)
}

/// A private in-memory database.
///
/// Pinned to a single long-lived connection so the data outlives idle
/// connection reaping.
async fn connect_in_memory() -> Result<Pool<Sqlite>> {
    let connect_options = SqliteConnectOptions::from_str(IN_MEMORY)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?;

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Open(format!("failed to initialize in-memory pool: {e}")))
}
