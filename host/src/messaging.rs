//! Native messaging protocol.
//!
//! Every message is a 4-byte native-endian length followed by that many
//! bytes of UTF-8 JSON. Requests carry a `requestId` that is echoed on the
//! matching `FIELDLENS_RESPONSE`; relay traffic is correlated by `relayId`.

use crate::error::CommandError;
use crate::state::AppState;
use fieldlens_browser::{RelayReply, RelayRequest};
use fieldlens_core::{ErrorCode, FieldListRequest, ScanMode, ScanRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Browsers refuse host messages larger than this.
pub const MAX_OUTBOUND_BYTES: usize = 1024 * 1024;
/// Upper bound accepted from the extension.
pub const MAX_INBOUND_BYTES: usize = 64 * 1024 * 1024;

/// Inbound: run an impact scan.
pub const SCAN_IMPACT: &str = "FIELDLENS_SCAN_IMPACT";
/// Inbound: list an object's fields.
pub const LOAD_FIELDS: &str = "FIELDLENS_LOAD_FIELDS";
/// Outbound: answer to either request.
pub const RESPONSE: &str = "FIELDLENS_RESPONSE";
/// Outbound: ask the extension to act in a tab.
pub const RELAY: &str = "FIELDLENS_RELAY";
/// Inbound: the extension's answer to a relay request.
pub const RELAY_RESULT: &str = "FIELDLENS_RELAY_RESULT";

/// Read one frame. `None` once the extension closed the stream.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    }

    let len = u32::from_ne_bytes(header) as usize;
    if len > MAX_INBOUND_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("inbound message of {len} bytes exceeds limit"),
        ));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Write one frame and flush it.
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(body.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "message too large to frame"))?;
    writer.write_all(&len.to_ne_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

/// Serialize an outbound message, enforcing the browser's size limit.
pub fn encode_outbound<T: Serialize>(message: &T) -> Result<Vec<u8>, CommandError> {
    let bytes = serde_json::to_vec(message).map_err(|err| {
        CommandError::new(
            ErrorCode::InternalError,
            format!("Failed to serialize message: {err}"),
        )
    })?;
    if bytes.len() > MAX_OUTBOUND_BYTES {
        return Err(CommandError::new(
            ErrorCode::InternalError,
            format!(
                "Response of {} bytes exceeds the native messaging limit of {MAX_OUTBOUND_BYTES} bytes.",
                bytes.len()
            ),
        ));
    }
    Ok(bytes)
}

/// `FIELDLENS_RESPONSE` envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(rename = "type")]
    kind: &'static str,
    /// Echo of the request's `requestId`
    pub request_id: Value,
    /// Whether `data` or `error` is present
    pub ok: bool,
    /// Payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure on error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl Response {
    /// Successful answer.
    pub fn success(request_id: Value, data: Value) -> Self {
        Self {
            kind: RESPONSE,
            request_id,
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed answer.
    pub fn failure(request_id: Value, error: CommandError) -> Self {
        Self {
            kind: RESPONSE,
            request_id,
            ok: false,
            data: None,
            error: Some(error),
        }
    }

    /// Frame body for this response. A response too large to send is
    /// replaced by an `INTERNAL_ERROR` for the same request.
    pub fn into_frame(self) -> Vec<u8> {
        match encode_outbound(&self) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(request_id = %self.request_id, "{}", error.message);
                let fallback = Self::failure(self.request_id, error);
                serde_json::to_vec(&fallback).unwrap_or_default()
            }
        }
    }
}

#[derive(Serialize)]
struct RelayEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    request: &'a RelayRequest,
}

/// Frame body for a relay request.
pub fn relay_frame(request: &RelayRequest) -> Result<Vec<u8>, CommandError> {
    encode_outbound(&RelayEnvelope {
        kind: RELAY,
        request,
    })
}

/// Message `type`, if any.
pub fn message_type(message: &Value) -> Option<&str> {
    message.get("type").and_then(Value::as_str)
}

/// Deliver a `FIELDLENS_RELAY_RESULT` to its waiter.
pub fn route_relay_result(state: &AppState, message: Value) {
    match serde_json::from_value::<RelayReply>(message) {
        Ok(reply) => {
            state.resolve_relay(reply);
        }
        Err(err) => tracing::warn!("Ignoring malformed relay result: {err}"),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ScanImpactMessage {
    base_url: Option<String>,
    object_api_name: Option<String>,
    field_api_name: Option<String>,
    scan_mode: Option<Value>,
    tab_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LoadFieldsMessage {
    base_url: Option<String>,
    object_api_name: Option<String>,
    tab_id: Option<i64>,
}

fn parse<T: for<'de> Deserialize<'de>>(message: Value) -> Result<T, CommandError> {
    serde_json::from_value(message).map_err(|err| {
        CommandError::new(ErrorCode::InvalidInput, format!("Malformed request: {err}"))
    })
}

/// Run a request message and build its response.
///
/// Messages without a `requestId` cannot be answered and yield `None`.
pub async fn handle_request(state: &AppState, message: Value) -> Option<Response> {
    let Some(request_id) = message.get("requestId").filter(|id| !id.is_null()).cloned() else {
        tracing::warn!(kind = ?message_type(&message), "Dropping message without requestId");
        return None;
    };

    let kind = message_type(&message).unwrap_or_default().to_string();
    tracing::debug!(request_id = %request_id, kind = %kind, "Handling request");

    let outcome = match kind.as_str() {
        SCAN_IMPACT => scan_impact(state, message).await,
        LOAD_FIELDS => load_fields(state, message).await,
        other => Err(CommandError::new(
            ErrorCode::UnknownAction,
            format!("Unknown action: {other}"),
        )),
    };

    Some(match outcome {
        Ok(data) => Response::success(request_id, data),
        Err(error) => Response::failure(request_id, error),
    })
}

async fn scan_impact(state: &AppState, message: Value) -> Result<Value, CommandError> {
    let message: ScanImpactMessage = parse(message)?;
    let scan_mode = match message.scan_mode {
        None | Some(Value::Null) => state.default_mode(),
        Some(Value::String(raw)) => ScanMode::from_request(Some(raw.as_str())),
        Some(_) => ScanMode::Quick,
    };
    let request = ScanRequest::new(
        message.base_url.as_deref().unwrap_or_default(),
        message.object_api_name.as_deref().unwrap_or_default(),
        message.field_api_name.as_deref().unwrap_or_default(),
        scan_mode,
    )?
    .with_tab(message.tab_id);

    let result = state.orchestrator().scan_impact(request).await?;
    to_data(&result)
}

async fn load_fields(state: &AppState, message: Value) -> Result<Value, CommandError> {
    let message: LoadFieldsMessage = parse(message)?;
    let request = FieldListRequest::new(
        message.base_url.as_deref().unwrap_or_default(),
        message.object_api_name.as_deref().unwrap_or_default(),
    )?
    .with_tab(message.tab_id);

    let payload = state.orchestrator().load_fields(request).await?;
    to_data(&payload)
}

fn to_data<T: Serialize>(payload: &T) -> Result<Value, CommandError> {
    serde_json::to_value(payload).map_err(|err| {
        CommandError::new(
            ErrorCode::InternalError,
            format!("Failed to serialize response: {err}"),
        )
    })
}
