//! Binding-agnostic connection handling.

pub mod handler;
pub mod transport;

pub use handler::serve_connection;
pub use transport::{BinaryFrameSink, BinaryFrameSource, FrameSink, FrameSource};
