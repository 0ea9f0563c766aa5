use fieldlens_browser::{
    BrowserError, CdpSession, CookieSource, ExtensionRelay, FetchWorld, RelayAction, RelayReply,
    TabBridge,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_relay_round_trip() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let relay = Arc::new(ExtensionRelay::new(tx, Duration::from_secs(5)));

    let extension = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move {
            let request = rx.recv().await.expect("relay request");
            assert_eq!(request.action, RelayAction::FetchJson);
            assert_eq!(request.tab_id, Some(7));
            relay.resolve(RelayReply {
                relay_id: request.relay_id,
                ok: true,
                status: Some(200),
                content_type: Some("application/json".to_string()),
                body: Some(r#"{"records":[]}"#.to_string()),
                ..RelayReply::default()
            })
        })
    };

    let response = relay
        .fetch_json(7, "https://acme.my.salesforce.com/services/data", FetchWorld::Isolated)
        .await
        .expect("tab fetch");

    assert!(extension.await.expect("extension task"));
    assert_eq!(response.status, 200);
    assert!(response.is_json());
    assert_eq!(relay.pending_count(), 0);
}

#[tokio::test]
async fn test_relay_timeout_clears_waiter() {
    let (tx, _rx) = mpsc::unbounded_channel();
    let relay = ExtensionRelay::new(tx, Duration::from_millis(20));

    let err = relay
        .fetch_json(1, "https://acme.my.salesforce.com/x", FetchWorld::Main)
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(relay.pending_count(), 0);
}

#[tokio::test]
async fn test_relay_closed_channel() {
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    let relay = ExtensionRelay::new(tx, Duration::from_secs(1));

    let err = relay
        .cookie("https://acme.my.salesforce.com/", "sid")
        .await
        .unwrap_err();
    assert!(matches!(err, BrowserError::RelayClosed));
}

#[tokio::test]
async fn test_relay_error_reply() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let relay = Arc::new(ExtensionRelay::new(tx, Duration::from_secs(5)));

    let responder = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move {
            let request = rx.recv().await.expect("relay request");
            relay.resolve(RelayReply {
                relay_id: request.relay_id,
                ok: false,
                ..RelayReply::default()
            });
        })
    };

    let err = relay
        .fetch_json(3, "https://acme.my.salesforce.com/x", FetchWorld::Isolated)
        .await
        .unwrap_err();
    responder.await.expect("responder");

    assert_eq!(err.status(), 0);
    assert!(matches!(err, BrowserError::FetchFailed { .. }));
}

#[tokio::test]
#[ignore] // Requires Chrome running with --remote-debugging-port=9222
async fn test_cdp_attach() {
    let session = CdpSession::connect("http://127.0.0.1:9222").await;
    assert!(session.is_ok(), "Failed to attach to Chrome");
}
