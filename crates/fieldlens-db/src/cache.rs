//! Persistent result cache.
//!
//! Stores one JSON payload per key in the `cache_entries` table. Expiry is
//! decided by the caller from `cached_at`; [`purge_older_than`] only does
//! housekeeping.

use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use fieldlens_core::{CacheEntry, CacheStore};
use sqlx::SqlitePool;

/// Write an entry, replacing any previous one.
pub async fn put_entry(pool: &SqlitePool, key: &str, entry: &CacheEntry) -> Result<()> {
    let payload = serde_json::to_string(&entry.payload)
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

    sqlx::query(
        r"
        INSERT INTO cache_entries (key, cached_at, payload)
        VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET
            cached_at = excluded.cached_at,
            payload = excluded.payload
        ",
    )
    .bind(key)
    .bind(entry.cached_at)
    .bind(payload)
    .execute(pool)
    .await?;

    Ok(())
}

/// Read an entry.
pub async fn get_entry(pool: &SqlitePool, key: &str) -> Result<Option<CacheEntry>> {
    let row: Option<(i64, String)> =
        sqlx::query_as("SELECT cached_at, payload FROM cache_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match row {
        Some((cached_at, payload)) => {
            let payload = serde_json::from_str(&payload)
                .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
            Ok(Some(CacheEntry { cached_at, payload }))
        }
        None => Ok(None),
    }
}

/// Delete an entry.
pub async fn delete_entry(pool: &SqlitePool, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM cache_entries WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete every entry written before `cutoff_ms`. Returns the number removed.
pub async fn purge_older_than(pool: &SqlitePool, cutoff_ms: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM cache_entries WHERE cached_at < ?")
        .bind(cutoff_ms)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Number of stored entries.
pub async fn count_entries(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM cache_entries")
        .fetch_one(pool)
        .await?)
}

/// [`CacheStore`] over the `cache_entries` table.
#[derive(Debug, Clone)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
}

impl SqliteCacheStore {
    /// Wrap an already-migrated pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> fieldlens_core::Result<Option<CacheEntry>> {
        Ok(get_entry(&self.pool, key).await?)
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> fieldlens_core::Result<()> {
        Ok(put_entry(&self.pool, key, &entry).await?)
    }

    async fn remove(&self, key: &str) -> fieldlens_core::Result<()> {
        Ok(delete_entry(&self.pool, key).await?)
    }
}
