//! FieldLens Native Messaging Host
//!
//! Thin process shell between the browser extension and the scan engine.
//! Reads framed requests on stdin, answers on stdout, and forwards tab
//! relay requests to the extension. Core logic lives in `crates/`.

pub mod error;
pub mod messaging;
pub mod state;

use anyhow::Context;
use fieldlens_browser::RelayRequest;
use fieldlens_core::{AppConfig, LoggingConfig};
use messaging::{
    handle_request, message_type, read_frame, relay_frame, route_relay_result, write_frame,
    RELAY_RESULT,
};
use serde_json::Value;
use state::AppState;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Initialize tracing. Logs go to stderr; stdout carries the protocol.
pub fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter.as_str()));

    if logging.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .init();
    }
}

/// Serve the extension over stdin/stdout until it disconnects.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting FieldLens host v{}", env!("CARGO_PKG_VERSION"));

    let (relay_tx, relay_rx) = mpsc::unbounded_channel();
    let state = AppState::from_config(&config, relay_tx)
        .await
        .context("failed to initialize host state")?;

    serve(
        Arc::new(state),
        tokio::io::stdin(),
        tokio::io::stdout(),
        relay_rx,
    )
    .await
}

/// Protocol loop over arbitrary streams.
///
/// Requests run concurrently; relay results are routed as soon as they are
/// read so a scan waiting on the extension never blocks the reader. Returns
/// once `input` reaches EOF and every accepted request has been answered.
pub async fn serve<R, W>(
    state: Arc<AppState>,
    mut input: R,
    output: W,
    mut relay_requests: mpsc::UnboundedReceiver<RelayRequest>,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(frame) = frames_rx.recv().await {
            write_frame(&mut output, &frame).await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let forwarder = {
        let frames = frames_tx.clone();
        tokio::spawn(async move {
            while let Some(request) = relay_requests.recv().await {
                match relay_frame(&request) {
                    Ok(frame) => {
                        if frames.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(
                        relay_id = request.relay_id,
                        "Relay request dropped: {}",
                        err.message
                    ),
                }
            }
        })
    };

    let mut in_flight = JoinSet::new();
    while let Some(frame) = read_frame(&mut input)
        .await
        .context("failed to read from extension")?
    {
        let message: Value = match serde_json::from_slice(&frame) {
            Ok(message) => message,
            Err(err) => {
                warn!("Ignoring malformed message: {err}");
                continue;
            }
        };

        if message_type(&message) == Some(RELAY_RESULT) {
            route_relay_result(&state, message);
            continue;
        }

        let state = Arc::clone(&state);
        let frames = frames_tx.clone();
        in_flight.spawn(async move {
            if let Some(response) = handle_request(&state, message).await {
                if frames.send(response.into_frame()).is_err() {
                    debug!("Writer closed before response was sent");
                }
            }
        });
    }

    debug!(pending = in_flight.len(), "Extension closed input");
    while let Some(joined) = in_flight.join_next().await {
        if let Err(err) = joined {
            warn!("Request task failed: {err}");
        }
    }

    forwarder.abort();
    // Cancelled is the expected outcome.
    let _ = forwarder.await;
    drop(frames_tx);

    writer
        .await
        .context("writer task failed")?
        .context("failed to write to extension")?;
    info!("FieldLens host stopped");
    Ok(())
}
