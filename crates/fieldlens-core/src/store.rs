//! Cache storage contracts.
//!
//! The coalescing layer talks to an asynchronous key-value store through
//! [`CacheStore`] and reads wall-clock time through [`Clock`], so both can be
//! swapped for deterministic fakes in tests. Keys carry a schema tag: bumping
//! [`CACHE_SCHEMA_VERSION`] orphans every entry written by an older engine.

use crate::error::Result;
use crate::types::{FieldListPayload, OrgUrl, ScanMode, ScanResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

/// Version tag embedded in every cache key.
pub const CACHE_SCHEMA_VERSION: u32 = 3;

/// Key for a scan result.
#[must_use]
pub fn scan_cache_key(org: &OrgUrl, object: &str, field: &str, mode: ScanMode) -> String {
    format!(
        "fieldlens:v{CACHE_SCHEMA_VERSION}:scan:{}:{object}:{field}:{mode}",
        org.host()
    )
}

/// Key for an object's field list.
#[must_use]
pub fn field_list_cache_key(org: &OrgUrl, object: &str) -> String {
    format!(
        "fieldlens:v{CACHE_SCHEMA_VERSION}:fields:{}:{object}",
        org.host()
    )
}

/// A stored payload and the time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Epoch milliseconds the entry was written
    pub cached_at: i64,
    /// Serialized payload
    pub payload: serde_json::Value,
}

/// Asynchronous key-value store backing the result cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read an entry.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Write an entry, replacing any previous one.
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()>;

    /// Delete an entry. Deleting a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now_ms(&self) -> i64;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Start at the given epoch milliseconds.
    #[must_use]
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    /// Move time forward.
    pub fn advance_ms(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Process-local store, used in tests and when persistence is disabled.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| poisoned())?
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }
}

fn poisoned() -> crate::FieldLensError {
    crate::FieldLensError::new(
        crate::ErrorCode::StorageError,
        "in-memory cache lock poisoned",
    )
}

/// Payloads that record whether they were served from the cache.
pub trait CachedPayload {
    /// Set the `fromCache` flag.
    fn set_from_cache(&mut self, from_cache: bool);
}

impl CachedPayload for ScanResult {
    fn set_from_cache(&mut self, from_cache: bool) {
        self.from_cache = from_cache;
    }
}

impl CachedPayload for FieldListPayload {
    fn set_from_cache(&mut self, from_cache: bool) {
        self.from_cache = from_cache;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_key_encodes_every_dimension() {
        let org = OrgUrl::parse("https://acme.lightning.force.com").expect("org");
        let key = scan_cache_key(&org, "Account", "Custom_Status__c", ScanMode::Deep);
        assert_eq!(
            key,
            format!(
                "fieldlens:v{CACHE_SCHEMA_VERSION}:scan:acme.lightning.force.com:Account:Custom_Status__c:deep"
            )
        );
        assert_ne!(
            key,
            scan_cache_key(&org, "Account", "Custom_Status__c", ScanMode::Quick)
        );
    }

    #[test]
    fn test_field_list_key() {
        let org = OrgUrl::parse("https://acme.my.salesforce.com").expect("org");
        assert!(field_list_cache_key(&org, "Lead").ends_with(":fields:acme.my.salesforce.com:Lead"));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        clock.advance_ms(500);
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryCacheStore::new();
        let entry = CacheEntry {
            cached_at: 42,
            payload: serde_json::json!({ "ok": true }),
        };

        store.set("k", entry.clone()).await.expect("set");
        assert_eq!(store.get("k").await.expect("get"), Some(entry));

        store.remove("k").await.expect("remove");
        assert_eq!(store.get("k").await.expect("get"), None);
        assert!(store.is_empty());
    }
}
