//! # Presentation Layer
//!
//! Transport bindings (raw TCP and WebSocket), the binding-agnostic
//! connection handler, and the broadcast hub.

pub mod connection;
pub mod hub;
pub mod tcp;
pub mod websocket;
