//! Transport Abstraction
//!
//! The connection handler is generic over an encoded-frame source/sink
//! pair, so the length-prefixed TCP binding and the JSON-envelope
//! WebSocket binding share one handler. Only framing differs.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::protocol::{packet, Frame, ProtocolError};

/// Inbound side of a transport. `Ok(None)` is a clean close.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError>;
}

/// Outbound side of a transport.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), ProtocolError>;
}

/// Length-prefixed binary frames over any byte-stream reader. Generic so
/// tests can drive the real handler over an in-memory duplex pipe.
pub struct BinaryFrameSource<R> {
    reader: R,
}

impl<R> BinaryFrameSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R> FrameSource for BinaryFrameSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        packet::read_frame(&mut self.reader).await
    }
}

/// Length-prefixed binary frames over any byte-stream writer.
pub struct BinaryFrameSink<W> {
    writer: W,
}

impl<W> BinaryFrameSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> FrameSink for BinaryFrameSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        let bytes = frame.encode()?;
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
