//! Redis Session Store
//!
//! The only component that touches the ephemeral store. Sessions live
//! under `session:<token>` as JSON with a 24-hour TTL; presence markers
//! live under `online:<user_id>` and hold the current token.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::domain::{Session, SessionStore, SESSION_TTL_SECS};
use crate::shared::error::AppError;

use super::keys;

#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
}

impl RedisSessionStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, session: &Session) -> Result<(), AppError> {
        let key = keys::session(&session.token);
        let value = serde_json::to_string(session)?;

        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(&key, value, SESSION_TTL_SECS)
            .await?;
        Ok(())
    }

    async fn validate(&self, token: &str) -> Result<Option<Session>, AppError> {
        let key = keys::session(token);

        let mut conn = self.redis.clone();
        let value: Option<String> = conn.get(&key).await?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn refresh(&self, token: &str) -> Result<(), AppError> {
        let key = keys::session(token);

        let mut conn = self.redis.clone();
        let _: bool = conn.expire(&key, SESSION_TTL_SECS as i64).await?;
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<(), AppError> {
        let key = keys::session(token);

        let mut conn = self.redis.clone();
        let _: i64 = conn.del(&key).await?;
        Ok(())
    }

    async fn set_user_online(&self, user_id: i64, token: &str) -> Result<(), AppError> {
        let key = keys::online(user_id);

        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(&key, token, SESSION_TTL_SECS)
            .await?;
        Ok(())
    }

    async fn set_user_offline(&self, user_id: i64) -> Result<(), AppError> {
        let key = keys::online(user_id);

        let mut conn = self.redis.clone();
        let _: i64 = conn.del(&key).await?;
        Ok(())
    }

    async fn is_user_online(&self, user_id: i64) -> Result<bool, AppError> {
        let key = keys::online(user_id);

        let mut conn = self.redis.clone();
        let exists: bool = conn.exists(&key).await?;
        Ok(exists)
    }
}
