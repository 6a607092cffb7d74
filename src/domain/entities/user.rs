//! User entity and repository traits.
//!
//! Maps to the `users` table. The repository traits are defined here, in
//! the domain layer, so infrastructure implements them and tests can
//! substitute in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Initial rating for a freshly registered account.
pub const INITIAL_SCORE: i32 = 1000;

/// Rating delta applied to the winner of a decisive game.
pub const WIN_SCORE_DELTA: i32 = 25;

/// Rating delta applied to the loser of a decisive game (negative).
pub const LOSE_SCORE_DELTA: i32 = -20;

/// A registered player.
///
/// Maps to the `users` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - username: VARCHAR NOT NULL UNIQUE
/// - password: VARCHAR NOT NULL (argon2 hash)
/// - score: INT NOT NULL DEFAULT 1000
/// - win_count / lose_count: INT NOT NULL DEFAULT 0
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    pub username: String,

    /// Argon2 hash; never serialized into any client-facing payload.
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub score: i32,

    pub win_count: i32,

    pub lose_count: i32,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Games played so far.
    pub fn games_played(&self) -> i32 {
        self.win_count + self.lose_count
    }
}

/// Data access contract for users and the scoreboard.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Insert a new user with the initial score. A duplicate username
    /// fails with `AppError::Conflict` (the database unique constraint is
    /// the arbiter under concurrent registration).
    async fn create(&self, username: &str, password_hash: &str) -> Result<User, AppError>;

    /// Atomically apply a score delta and bump the win or loss counter.
    async fn adjust_score(&self, user_id: i64, delta: i32, won: bool) -> Result<(), AppError>;

    /// One leaderboard page, ordered by score descending.
    async fn leaderboard_page(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError>;

    /// `1 + count(users with strictly greater score)`; ties share the
    /// lower numerical rank.
    async fn rank_of(&self, user_id: i64) -> Result<i64, AppError>;
}

/// Audit trail for finished games (the optional `games` table). Both
/// operations are best-effort; the core never reads the table back.
#[async_trait]
pub trait GameRecordRepository: Send + Sync {
    /// Insert a record when a game starts; returns the record id.
    async fn create(&self, room_id: i64, black: i64, white: i64) -> Result<i64, AppError>;

    /// Stamp the winner, final board JSON and end time on the newest
    /// record for the room.
    async fn finish_by_room(
        &self,
        room_id: i64,
        winner_id: i64,
        board_state: &str,
    ) -> Result<(), AppError>;
}
