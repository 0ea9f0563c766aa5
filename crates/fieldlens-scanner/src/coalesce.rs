//! TTL memoization plus collapse of identical in-flight requests.
//!
//! One [`RequestCoalescer`] exists per payload kind per process. A request
//! first looks for a fresh cache entry, then for a computation already
//! running under the same key, and only then starts a new one. At most one
//! computation runs per key; everyone asking while it runs awaits the same
//! shared future. Successes are written to the cache; failures never are.

use fieldlens_core::{CacheEntry, CacheStore, CachedPayload, Clock, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

type InFlight<T> = Shared<BoxFuture<'static, Result<T>>>;
type InFlightMap<T> = Arc<Mutex<HashMap<String, InFlight<T>>>>;

/// Cache-then-coalesce front for one payload kind.
pub struct RequestCoalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
    in_flight: InFlightMap<T>,
}

impl<T> RequestCoalescer<T>
where
    T: CachedPayload + Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a coalescer over `store`, expiring entries older than `ttl_ms`.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>, ttl_ms: i64) -> Self {
        Self {
            store,
            clock,
            ttl_ms,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of computations currently running.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Return the cached payload for `key`, or compute it once.
    ///
    /// `compute` is only invoked when there is neither a fresh cache entry
    /// nor a computation already running for `key`.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(cached) = self.read_fresh(key).await {
            tracing::debug!(key, "Cache hit");
            return Ok(cached);
        }

        let shared = {
            let mut in_flight = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(running) = in_flight.get(key) {
                tracing::debug!(key, "Joining in-flight request");
                running.clone()
            } else {
                let shared = self.register(key.to_string(), compute());
                in_flight.insert(key.to_string(), shared.clone());
                shared
            }
        };

        shared.await
    }

    /// Wrap a computation so it caches its success and always leaves the
    /// in-flight map when it settles.
    fn register<Fut>(&self, key: String, computation: Fut) -> InFlight<T>
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let in_flight = Arc::clone(&self.in_flight);

        async move {
            let result = computation.await.map(|mut payload| {
                payload.set_from_cache(false);
                payload
            });

            if let Ok(payload) = &result {
                match serde_json::to_value(payload) {
                    Ok(serialized) => {
                        let entry = CacheEntry {
                            cached_at: clock.now_ms(),
                            payload: serialized,
                        };
                        if let Err(err) = store.set(&key, entry).await {
                            tracing::warn!(key = %key, "Failed to cache result: {}", err.message);
                        }
                    }
                    Err(err) => tracing::warn!(key = %key, "Failed to serialize result: {err}"),
                }
            }

            in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
            result
        }
        .boxed()
        .shared()
    }

    /// Fresh cached payload, tagged `fromCache`. Expired and unreadable
    /// entries are removed.
    async fn read_fresh(&self, key: &str) -> Option<T> {
        let entry = match self.store.get(key).await {
            Ok(entry) => entry?,
            Err(err) => {
                tracing::warn!(key, "Cache read failed: {}", err.message);
                return None;
            }
        };

        let age = self.clock.now_ms().saturating_sub(entry.cached_at);
        if age > self.ttl_ms {
            tracing::debug!(key, age_ms = age, "Cache entry expired");
            self.evict(key).await;
            return None;
        }

        match serde_json::from_value::<T>(entry.payload) {
            Ok(mut payload) => {
                payload.set_from_cache(true);
                Some(payload)
            }
            Err(err) => {
                tracing::warn!(key, "Discarding unreadable cache entry: {err}");
                self.evict(key).await;
                None
            }
        }
    }

    async fn evict(&self, key: &str) {
        if let Err(err) = self.store.remove(key).await {
            tracing::warn!(key, "Failed to evict cache entry: {}", err.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlens_core::{ErrorCode, FieldLensError, FieldListPayload, ManualClock, MemoryCacheStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL_MS: i64 = 600_000;

    fn payload(object: &str) -> FieldListPayload {
        FieldListPayload {
            object_api_name: object.to_string(),
            fields: Vec::new(),
            generated_at: 1,
            from_cache: false,
        }
    }

    fn coalescer(
        store: &Arc<MemoryCacheStore>,
        clock: &Arc<ManualClock>,
    ) -> RequestCoalescer<FieldListPayload> {
        RequestCoalescer::new(store.clone(), clock.clone(), TTL_MS)
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let store = Arc::new(MemoryCacheStore::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let coalescer = coalescer(&store, &clock);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            coalescer
                .get_or_compute("k", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(payload("Account"))
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let cached = coalescer
            .get_or_compute("k", || async { Err(FieldLensError::internal("not called")) })
            .await
            .unwrap();
        assert!(cached.from_cache);
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_entry_is_recomputed_and_removed() {
        let store = Arc::new(MemoryCacheStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let coalescer = coalescer(&store, &clock);

        coalescer
            .get_or_compute("k", || async { Ok(payload("Account")) })
            .await
            .unwrap();
        clock.advance_ms(TTL_MS);
        let at_ttl = coalescer
            .get_or_compute("k", || async { Err(FieldLensError::internal("not called")) })
            .await
            .unwrap();
        assert!(at_ttl.from_cache);

        clock.advance_ms(1);
        let err = coalescer
            .get_or_compute("k", || async {
                Err(FieldLensError::new(ErrorCode::NotLoggedIn, "expired session"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotLoggedIn);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let store = Arc::new(MemoryCacheStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let coalescer = coalescer(&store, &clock);

        let err = coalescer
            .get_or_compute("k", || async { Err(FieldLensError::internal("boom")) })
            .await
            .unwrap_err();
        assert_eq!(err.message, "boom");
        assert!(store.is_empty());
        assert_eq!(coalescer.in_flight_count(), 0);

        let fresh = coalescer
            .get_or_compute("k", || async { Ok(payload("Lead")) })
            .await
            .unwrap();
        assert!(!fresh.from_cache);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_computation() {
        let store = Arc::new(MemoryCacheStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let coalescer = coalescer(&store, &clock);
        let calls = Arc::new(AtomicUsize::new(0));
        let (release, gate) = tokio::sync::oneshot::channel::<()>();
        let gate = gate.shared();

        let requests = (0..4).map(|_| {
            let calls = Arc::clone(&calls);
            let gate = gate.clone();
            coalescer.get_or_compute("k", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let _ = gate.await;
                Ok(payload("Account"))
            })
        });
        let joined = futures::future::join_all(requests);
        let release = async move {
            tokio::task::yield_now().await;
            let _ = release.send(());
        };
        let (results, ()) = futures::join!(joined, release);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|result| result.as_ref().is_ok_and(|p| !p.from_cache)));
        assert_eq!(coalescer.in_flight_count(), 0);
    }
}
