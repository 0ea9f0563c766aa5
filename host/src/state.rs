//! Process-wide host state.

use crate::error::CommandError;
use fieldlens_browser::{CdpSession, ExtensionRelay, RelayReply, RelayRequest};
use fieldlens_client::{ReqwestFetcher, SalesforceClient, TransportPipeline};
use fieldlens_core::{
    AppConfig, CacheStore, Clock, ErrorCode, FieldLensError, MemoryCacheStore, ScanMode,
    SystemClock,
};
use fieldlens_db::Database;
use fieldlens_scanner::ScanOrchestrator;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything a request handler needs, built once at startup.
pub struct AppState {
    orchestrator: ScanOrchestrator,
    relay: Option<Arc<ExtensionRelay>>,
    default_mode: ScanMode,
}

impl AppState {
    /// Assemble state from already-built parts.
    pub fn new(
        orchestrator: ScanOrchestrator,
        relay: Option<Arc<ExtensionRelay>>,
        default_mode: ScanMode,
    ) -> Self {
        Self {
            orchestrator,
            relay,
            default_mode,
        }
    }

    /// Build the cache, transport and orchestrator described by `config`.
    ///
    /// Tab-side fetches go through the extension relay, whose requests are
    /// pushed onto `relay_requests`, unless `browser.cdp_url` points at a
    /// DevTools endpoint.
    pub async fn from_config(
        config: &AppConfig,
        relay_requests: mpsc::UnboundedSender<RelayRequest>,
    ) -> Result<Self, CommandError> {
        let store = open_store(config).await?;
        let fetcher = ReqwestFetcher::new(&config.api)?;
        let mut transport = TransportPipeline::new(Arc::new(fetcher));
        let mut relay = None;

        if let Some(endpoint) = config.browser.cdp_url.as_deref() {
            let session = CdpSession::connect(endpoint).await.map_err(|err| {
                FieldLensError::new(
                    ErrorCode::NetworkError,
                    format!("Failed to attach to Chrome DevTools at {endpoint}: {err}"),
                )
            })?;
            let session = Arc::new(session);
            transport = transport
                .with_cookies(session.clone())
                .with_tabs(session);
        } else {
            let bridge = Arc::new(ExtensionRelay::new(
                relay_requests,
                config.browser.relay_timeout(),
            ));
            transport = transport
                .with_cookies(bridge.clone())
                .with_tabs(bridge.clone());
            relay = Some(bridge);
        }

        let client = SalesforceClient::new(transport, config.api.api_version.clone());
        let orchestrator =
            ScanOrchestrator::from_config(client, store, Arc::new(SystemClock), config);

        Ok(Self::new(
            orchestrator,
            relay,
            ScanMode::from_request(Some(config.scanning.default_mode.as_str())),
        ))
    }

    /// The scan entry point.
    pub fn orchestrator(&self) -> &ScanOrchestrator {
        &self.orchestrator
    }

    /// Mode used when a request does not name one.
    pub fn default_mode(&self) -> ScanMode {
        self.default_mode
    }

    /// Hand an extension reply to the waiting tab fetch.
    pub fn resolve_relay(&self, reply: RelayReply) -> bool {
        match &self.relay {
            Some(relay) => relay.resolve(reply),
            None => {
                tracing::debug!(
                    relay_id = reply.relay_id,
                    "Relay reply ignored: DevTools transport in use"
                );
                false
            }
        }
    }
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn CacheStore>, CommandError> {
    if config.cache.in_memory {
        tracing::info!("Using in-memory result cache");
        return Ok(Arc::new(MemoryCacheStore::new()));
    }

    let path = config.cache_database_path()?;
    let database = Database::new(&path).await.map_err(FieldLensError::from)?;
    database.run_migrations().await.map_err(FieldLensError::from)?;

    // Expired rows are never served again.
    let cutoff = SystemClock.now_ms().saturating_sub(config.cache.ttl_ms());
    if let Err(err) = database.purge_expired(cutoff).await {
        tracing::warn!("Failed to purge expired cache entries: {err}");
    }
    tracing::info!("Result cache: {}", path.display());
    Ok(Arc::new(database.cache_store()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.cache.database_path = Some(dir.path().join("cache").join("cache.db"));
        config
    }

    #[tokio::test]
    async fn test_from_config_uses_relay_by_default() {
        let dir = TempDir::new().expect("temp dir");
        let (tx, _rx) = mpsc::unbounded_channel();

        let state = AppState::from_config(&config_in(&dir), tx)
            .await
            .expect("build state");

        assert!(state.relay.is_some());
        assert_eq!(state.default_mode(), ScanMode::Quick);
        assert!(dir.path().join("cache").join("cache.db").exists());
    }

    #[tokio::test]
    async fn test_in_memory_cache_and_deep_default() {
        let dir = TempDir::new().expect("temp dir");
        let mut config = config_in(&dir);
        config.cache.in_memory = true;
        config.scanning.default_mode = "deep".to_string();
        let (tx, _rx) = mpsc::unbounded_channel();

        let state = AppState::from_config(&config, tx).await.expect("build state");

        assert_eq!(state.default_mode(), ScanMode::Deep);
        assert!(!dir.path().join("cache").exists());
    }

    #[tokio::test]
    async fn test_unknown_relay_reply_is_dropped() {
        let dir = TempDir::new().expect("temp dir");
        let (tx, _rx) = mpsc::unbounded_channel();
        let state = AppState::from_config(&config_in(&dir), tx)
            .await
            .expect("build state");

        let reply = RelayReply {
            relay_id: 404,
            ..RelayReply::default()
        };
        assert!(!state.resolve_relay(reply));
    }
}
