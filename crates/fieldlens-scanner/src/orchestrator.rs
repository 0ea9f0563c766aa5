//! Scan orchestrator: the cached, coalesced entry point for both operations.
//!
//! `ScanOrchestrator` is constructed once per process. It owns one
//! [`RequestCoalescer`] for scan results and one for field lists, so
//! repeated and concurrent identical requests cost at most one fan-out.

use crate::aggregator::ImpactScanner;
use crate::coalesce::RequestCoalescer;
use crate::fields::load_field_list;
use fieldlens_client::SalesforceClient;
use fieldlens_core::{
    field_list_cache_key, scan_cache_key, AppConfig, CacheStore, Clock, FieldListPayload,
    FieldListRequest, Result, ScanRequest, ScanResult,
};
use std::sync::Arc;

/// Entry point for impact scans and field list loads.
pub struct ScanOrchestrator {
    scanner: Arc<ImpactScanner>,
    scans: RequestCoalescer<ScanResult>,
    field_lists: RequestCoalescer<FieldListPayload>,
}

impl ScanOrchestrator {
    /// Create an orchestrator with explicit cache settings.
    #[must_use]
    pub fn new(
        client: SalesforceClient,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        ttl_ms: i64,
        detail_fetch_limit: usize,
    ) -> Self {
        Self {
            scanner: Arc::new(ImpactScanner::new(
                client,
                Arc::clone(&clock),
                detail_fetch_limit,
            )),
            scans: RequestCoalescer::new(Arc::clone(&store), Arc::clone(&clock), ttl_ms),
            field_lists: RequestCoalescer::new(store, clock, ttl_ms),
        }
    }

    /// Create an orchestrator from application settings.
    #[must_use]
    pub fn from_config(
        client: SalesforceClient,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> Self {
        Self::new(
            client,
            store,
            clock,
            config.cache.ttl_ms(),
            config.scanning.detail_fetch_limit,
        )
    }

    /// Find everything that references `request`'s field.
    ///
    /// A fresh cached result is returned with `fromCache = true`. Otherwise
    /// the scan runs once per key no matter how many callers ask at the same
    /// time.
    pub async fn scan_impact(&self, request: ScanRequest) -> Result<ScanResult> {
        let key = scan_cache_key(
            &request.org,
            &request.object_api_name,
            &request.field_api_name,
            request.scan_mode,
        );
        let scanner = Arc::clone(&self.scanner);
        self.scans
            .get_or_compute(&key, move || async move { scanner.scan(&request).await })
            .await
    }

    /// List the fields of `request`'s object, cached like scans.
    pub async fn load_fields(&self, request: FieldListRequest) -> Result<FieldListPayload> {
        let key = field_list_cache_key(&request.org, &request.object_api_name);
        let scanner = Arc::clone(&self.scanner);
        self.field_lists
            .get_or_compute(&key, move || async move {
                load_field_list(scanner.client(), scanner.clock().as_ref(), &request).await
            })
            .await
    }
}
