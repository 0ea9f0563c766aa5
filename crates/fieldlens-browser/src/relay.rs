//! Request/response correlation with the browser extension.
//!
//! The host cannot call into a tab directly. It writes a [`RelayRequest`]
//! to the extension and parks a oneshot under a fresh id; the extension's
//! [`RelayReply`] with the same id wakes it. Unanswered requests fail with
//! [`BrowserError::Timeout`] after the configured deadline.

use crate::bridge::{CookieSource, FetchWorld, TabBridge, TabFetchResponse};
use crate::error::{BrowserError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Correlation table: monotonically increasing ids, one waiter per id.
#[derive(Debug)]
pub struct PendingRequests<T> {
    next_id: AtomicU64,
    waiters: Mutex<HashMap<u64, oneshot::Sender<T>>>,
}

impl<T> Default for PendingRequests<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            waiters: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> PendingRequests<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and the receiver its reply will arrive on.
    pub fn register(&self) -> (u64, oneshot::Receiver<T>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        (id, rx)
    }

    /// Deliver a reply. Returns false for unknown or already settled ids.
    pub fn resolve(&self, id: u64, value: T) -> bool {
        let waiter = self
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match waiter {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Forget a waiter.
    pub fn cancel(&self, id: u64) {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub fn len(&self) -> usize {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelayAction {
    FetchJson,
    FetchJsonMainWorld,
    GetCookie,
}

/// Host → extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub relay_id: u64,
    pub action: RelayAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<i64>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Extension → host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayReply {
    pub relay_id: u64,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub error: Option<RelayErrorBody>,
}

/// Tab bridge and cookie source backed by the extension.
#[derive(Debug)]
pub struct ExtensionRelay {
    outbound: mpsc::UnboundedSender<RelayRequest>,
    pending: PendingRequests<RelayReply>,
    timeout: Duration,
}

impl ExtensionRelay {
    /// `outbound` is drained by whatever writes to the extension.
    pub fn new(outbound: mpsc::UnboundedSender<RelayRequest>, timeout: Duration) -> Self {
        Self {
            outbound,
            pending: PendingRequests::new(),
            timeout,
        }
    }

    /// Hand an inbound reply to its waiter.
    pub fn resolve(&self, reply: RelayReply) -> bool {
        let relay_id = reply.relay_id;
        let delivered = self.pending.resolve(relay_id, reply);
        if !delivered {
            tracing::debug!(relay_id, "Dropping relay reply with no waiter");
        }
        delivered
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    async fn call(
        &self,
        action: RelayAction,
        tab_id: Option<i64>,
        url: &str,
        name: Option<&str>,
    ) -> Result<RelayReply> {
        let (relay_id, rx) = self.pending.register();
        let request = RelayRequest {
            relay_id,
            action,
            tab_id,
            url: url.to_string(),
            name: name.map(str::to_string),
        };

        if self.outbound.send(request).is_err() {
            self.pending.cancel(relay_id);
            return Err(BrowserError::RelayClosed);
        }
        tracing::debug!(relay_id, ?action, "Relay request sent");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(BrowserError::RelayClosed),
            Err(_) => {
                self.pending.cancel(relay_id);
                Err(BrowserError::Timeout(
                    "Request timed out while waiting for extension response.".to_string(),
                ))
            }
        }
    }
}

#[async_trait::async_trait]
impl TabBridge for ExtensionRelay {
    async fn fetch_json(
        &self,
        tab_id: i64,
        url: &str,
        world: FetchWorld,
    ) -> Result<TabFetchResponse> {
        let action = match world {
            FetchWorld::Isolated => RelayAction::FetchJson,
            FetchWorld::Main => RelayAction::FetchJsonMainWorld,
        };
        let reply = self.call(action, Some(tab_id), url, None).await?;

        if !reply.ok {
            let error = reply.error.unwrap_or_default();
            return Err(BrowserError::FetchFailed {
                status: reply.status.unwrap_or(0),
                code: error.code,
                message: error
                    .message
                    .unwrap_or_else(|| "Failed to fetch Salesforce API in tab context.".to_string()),
            });
        }

        Ok(TabFetchResponse {
            status: reply.status.unwrap_or(0),
            content_type: reply.content_type.unwrap_or_default(),
            body: reply.body.unwrap_or_default(),
        })
    }
}

#[async_trait::async_trait]
impl CookieSource for ExtensionRelay {
    async fn cookie(&self, url: &str, name: &str) -> Result<Option<String>> {
        let reply = self.call(RelayAction::GetCookie, None, url, Some(name)).await?;
        Ok(reply.value.filter(|value| !value.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let pending: PendingRequests<u8> = PendingRequests::new();
        let (first, _rx1) = pending.register();
        let (second, _rx2) = pending.register();
        assert!(second > first);
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_wakes_waiter_once() {
        let pending = PendingRequests::new();
        let (id, rx) = pending.register();

        assert!(pending.resolve(id, "done"));
        assert!(!pending.resolve(id, "again"));
        assert_eq!(rx.await.unwrap(), "done");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_request_wire_shape() {
        let request = RelayRequest {
            relay_id: 3,
            action: RelayAction::FetchJsonMainWorld,
            tab_id: Some(42),
            url: "https://acme.my.salesforce.com/x".to_string(),
            name: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["relayId"], 3);
        assert_eq!(json["action"], "fetchJsonMainWorld");
        assert_eq!(json["tabId"], 42);
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_reply_tolerates_missing_fields() {
        let reply: RelayReply = serde_json::from_str(r#"{"relayId":9,"ok":true}"#).unwrap();
        assert_eq!(reply.relay_id, 9);
        assert!(reply.status.is_none());
    }
}
