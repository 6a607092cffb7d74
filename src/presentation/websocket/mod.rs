//! WebSocket Binding
//!
//! Carries the same message registry as the TCP binding, one JSON text
//! message per frame: `{"type": u16, "payload": {...}}`. Length and
//! sequence fields are absent on this wire; framing belongs to the
//! WebSocket layer.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::presentation::connection::{serve_connection, FrameSink, FrameSource};
use crate::protocol::{Frame, ProtocolError};
use crate::startup::ServerState;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (sink, stream) = socket.split();
    serve_connection(
        state,
        WsFrameSource::new(stream),
        WsFrameSink::new(sink),
        "websocket".to_string(),
    )
    .await;
}

#[derive(Deserialize)]
struct WsInbound<'a> {
    #[serde(rename = "type")]
    msg_type: u16,
    #[serde(borrow)]
    payload: Option<&'a RawValue>,
}

#[derive(Serialize)]
struct WsOutbound<'a> {
    #[serde(rename = "type")]
    msg_type: u16,
    payload: &'a RawValue,
}

/// Parse one text message into a frame. The sequence is fixed at 0; this
/// binding has no sequence field and responses echo it back as such.
fn decode_envelope(text: &str) -> Result<Frame, ProtocolError> {
    let inbound: WsInbound = serde_json::from_str(text)?;
    let payload = match inbound.payload {
        Some(raw) => raw.get().as_bytes().to_vec(),
        None => b"{}".to_vec(),
    };
    Ok(Frame::new(inbound.msg_type, 0, payload))
}

/// Wrap a frame's JSON payload in the envelope.
fn encode_envelope(frame: &Frame) -> Result<String, ProtocolError> {
    let payload: &RawValue = serde_json::from_slice(&frame.payload)?;
    Ok(serde_json::to_string(&WsOutbound {
        msg_type: frame.msg_type,
        payload,
    })?)
}

pub struct WsFrameSource {
    stream: SplitStream<WebSocket>,
}

impl WsFrameSource {
    pub fn new(stream: SplitStream<WebSocket>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return decode_envelope(&text).map(Some),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Control frames are the WebSocket layer's business.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(ProtocolError::Io(std::io::Error::other(e)));
                }
            }
        }
    }
}

pub struct WsFrameSink {
    sink: SplitSink<WebSocket, Message>,
}

impl WsFrameSink {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        let text = encode_envelope(frame)?;
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| ProtocolError::Io(std::io::Error::other(e)))
    }
}
