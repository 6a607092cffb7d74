//! Cache Module
//!
//! Redis connection management and the session/presence store.

mod session_store;

pub use session_store::RedisSessionStore;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::info;

use crate::config::RedisSettings;

/// Create a Redis connection manager with automatic reconnection.
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Cache key prefixes.
pub mod keys {
    /// Prefix for session records (e.g. "session:<token>")
    pub const SESSION: &str = "session:";

    /// Prefix for online-presence markers (e.g. "online:<user_id>")
    pub const ONLINE: &str = "online:";

    #[inline]
    pub fn session(token: &str) -> String {
        format!("{SESSION}{token}")
    }

    #[inline]
    pub fn online(user_id: i64) -> String {
        format!("{ONLINE}{user_id}")
    }
}
