//! Session entity and the ephemeral-store contract.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Session lifetime; refreshed on ping and on token login.
pub const SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// A live login, keyed in the ephemeral store by `session:<token>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub token: String,
    pub created_at: i64,
}

impl Session {
    pub fn new(user_id: i64, username: String, token: String) -> Self {
        Self {
            user_id,
            username,
            token,
            created_at: Utc::now().timestamp(),
        }
    }
}

/// Ephemeral key-value store contract: sessions plus the per-user
/// presence marker (`online:<user_id>` -> token). The redis adapter is
/// the only implementation that talks to the outside world; tests use an
/// in-memory fake.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store the session under its token with the standard TTL.
    async fn create(&self, session: &Session) -> Result<(), AppError>;

    /// Look up a session; `None` when missing or expired.
    async fn validate(&self, token: &str) -> Result<Option<Session>, AppError>;

    /// Extend the TTL by the standard lifetime.
    async fn refresh(&self, token: &str) -> Result<(), AppError>;

    async fn delete(&self, token: &str) -> Result<(), AppError>;

    /// Presence marker maintenance. Existence of the marker means "at
    /// least one live connection".
    async fn set_user_online(&self, user_id: i64, token: &str) -> Result<(), AppError>;

    async fn set_user_offline(&self, user_id: i64) -> Result<(), AppError>;

    async fn is_user_online(&self, user_id: i64) -> Result<bool, AppError>;
}
