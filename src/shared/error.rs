//! Application Error Types
//!
//! Errors surfaced by the store adapters (Postgres, Redis). Domain-level
//! failures (game rules, room membership, auth) carry their own enums next
//! to the code that raises them.

use thiserror::Error;

/// Store adapter error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the error maps to a uniqueness conflict (duplicate key).
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}
