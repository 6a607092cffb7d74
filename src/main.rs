//! # Gomoku Game Server
//!
//! Application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Database connection pool
//! - Redis client
//! - TCP and HTTP/WebSocket listeners

use anyhow::Result;
use tracing::info;

use gomoku_server::config::Settings;
use gomoku_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    gomoku_server::telemetry::init_tracing();

    info!("Starting Gomoku Server...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        tcp_port = settings.server.tcp_port,
        http_port = settings.server.http_port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
