//! FieldLens Database Layer
//!
//! Provides the `SQLite` result cache that lets scans and field lists survive
//! host restarts. Uses `SQLx` with embedded migrations.
//!
//! # Example
//!
//! ```ignore
//! use fieldlens_db::Database;
//!
//! let db = Database::new("cache.db").await?;
//! db.run_migrations().await?;
//! let store = db.cache_store();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cache;
pub mod connection;
pub mod error;

// Re-export commonly used types
pub use cache::SqliteCacheStore;
pub use error::{DatabaseError, Result};

use sqlx::migrate::Migrator;
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Schema of the cache database, embedded at compile time.
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// High-level database handle with migrations.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (creating if needed) the database at `path`.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::connect(path).await?;
        Ok(Self { pool })
    }

    /// Open a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::new(":memory:").await
    }

    /// Apply pending migrations. Applied versions are tracked in
    /// `_sqlx_migrations`, so this runs on every start.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(format!("migration execution failed: {e}")))?;
        tracing::debug!(migrations = MIGRATOR.iter().count(), "Cache schema up to date");
        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// A [`fieldlens_core::CacheStore`] sharing this database's pool.
    #[must_use]
    pub fn cache_store(&self) -> SqliteCacheStore {
        SqliteCacheStore::new(self.pool.clone())
    }

    /// Drop entries written before `cutoff_ms`.
    pub async fn purge_expired(&self, cutoff_ms: i64) -> Result<u64> {
        let removed = cache::purge_older_than(&self.pool, cutoff_ms).await?;
        if removed > 0 {
            tracing::debug!(removed, "Purged expired cache entries");
        }
        Ok(removed)
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::debug!("Cache database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_create_cache_table() {
        let db = Database::in_memory().await.expect("open database");
        db.run_migrations().await.expect("run migrations");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .expect("query tables");
        assert_eq!(tables, vec!["cache_entries"]);
    }

    #[tokio::test]
    async fn test_migrations_apply_once() {
        let db = Database::in_memory().await.expect("open database");
        db.run_migrations().await.expect("first run");
        db.run_migrations().await.expect("second run");

        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
            .fetch_one(db.pool())
            .await
            .expect("count applied migrations");
        assert_eq!(applied, i64::try_from(MIGRATOR.iter().count()).unwrap());
        assert_eq!(applied, 2);
    }
}
