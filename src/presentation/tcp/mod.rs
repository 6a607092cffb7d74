//! Raw TCP Binding
//!
//! Accept loop for the length-prefixed binary protocol. Each connection
//! gets its own task running the shared handler.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, warn};

use crate::presentation::connection::{serve_connection, BinaryFrameSink, BinaryFrameSource};
use crate::startup::ServerState;

/// Accept connections until the listener is torn down.
pub async fn run_acceptor(listener: TcpListener, state: Arc<ServerState>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(peer = %addr, "Accepted TCP connection");
                let state = state.clone();
                tokio::spawn(async move {
                    let (read_half, write_half) = stream.into_split();
                    serve_connection(
                        state,
                        BinaryFrameSource::new(read_half),
                        BinaryFrameSink::new(write_half),
                        addr.to_string(),
                    )
                    .await;
                });
            }
            Err(e) => {
                warn!(error = %e, "Accept failed");
            }
        }
    }
}
