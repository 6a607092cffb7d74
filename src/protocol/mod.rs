//! Wire Protocol
//!
//! Framing and the closed message-type registry shared by both transport
//! bindings. The raw TCP binding carries length-prefixed binary frames;
//! the WebSocket binding carries the same JSON payloads in a
//! `{"type": u16, "payload": {...}}` envelope.

pub mod message;
pub mod packet;

pub use message::{msg_type, ClientMessage, ServerMessage};
pub use packet::{read_frame, Frame, ProtocolError, HEADER_LEN, MAX_BODY_LEN};
