//! Wire Framing
//!
//! Length-prefixed binary frames carried over the raw TCP binding:
//!
//! ```text
//! | Len u32 BE | Type u16 BE | Seq u16 BE | Payload bytes[Len-8] |
//! ```
//!
//! `Len` counts the header, so `Len == 8 + |payload|` always holds.
//! The WebSocket binding skips this layer entirely and wraps the same
//! payloads in a JSON envelope (see `presentation::websocket`).

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 8;

/// Maximum payload size per frame.
pub const MAX_BODY_LEN: usize = 65_535;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid packet")]
    InvalidPacket,

    #[error("packet too large")]
    PacketTooLarge,

    #[error("unknown message type: {0}")]
    UnknownMsgType(u16),

    #[error("invalid payload")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed")]
    ConnectionClosed,
}

impl ProtocolError {
    /// Whether the connection must be torn down (framing violation or I/O
    /// failure) as opposed to a recoverable per-message decode error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidPacket
                | ProtocolError::PacketTooLarge
                | ProtocolError::Io(_)
                | ProtocolError::ConnectionClosed
        )
    }
}

/// A decoded wire frame: type code, sequence number and raw JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: u16,
    pub seq: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(msg_type: u16, seq: u16, payload: Vec<u8>) -> Self {
        Self {
            msg_type,
            seq,
            payload,
        }
    }

    /// Serialize into the length-prefixed binary layout.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        if self.payload.len() > MAX_BODY_LEN {
            return Err(ProtocolError::PacketTooLarge);
        }

        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u32((HEADER_LEN + self.payload.len()) as u32);
        buf.put_u16(self.msg_type);
        buf.put_u16(self.seq);
        buf.put_slice(&self.payload);
        Ok(buf)
    }
}

/// Read one frame from the transport.
///
/// Returns `Ok(None)` on a clean close (EOF at a frame boundary); EOF in
/// the middle of a frame is an error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let msg_type = u16::from_be_bytes([header[4], header[5]]);
    let seq = u16::from_be_bytes([header[6], header[7]]);

    if len < HEADER_LEN {
        return Err(ProtocolError::InvalidPacket);
    }
    let body_len = len - HEADER_LEN;
    if body_len > MAX_BODY_LEN {
        return Err(ProtocolError::InvalidPacket);
    }

    let mut payload = vec![0u8; body_len];
    if body_len > 0 {
        reader.read_exact(&mut payload).await?;
    }

    Ok(Some(Frame {
        msg_type,
        seq,
        payload,
    }))
}
