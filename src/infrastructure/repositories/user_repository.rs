//! User Repository Implementation
//!
//! PostgreSQL implementation of the UserRepository trait. Maps between
//! the `users` table and the domain User entity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{User, UserRepository, INITIAL_SCORE};
use crate::shared::error::AppError;

/// Database row matching the `users` table. The password column is named
/// `password` for wire-format compatibility with the legacy schema.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    score: i32,
    win_count: i32,
    lose_count: i32,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            password_hash: self.password,
            score: self.score,
            win_count: self.win_count,
            lose_count: self.lose_count,
            created_at: self.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password, score, win_count, lose_count, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password, score, win_count, lose_count, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn create(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, password, score, win_count, lose_count)
            VALUES ($1, $2, $3, 0, 0)
            RETURNING id, username, password, score, win_count, lose_count, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(INITIAL_SCORE)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // The unique constraint on username decides concurrent
            // registrations; surface it as a conflict, not a 500.
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return AppError::Conflict(format!("username '{username}' already taken"));
                }
            }
            AppError::Database(e)
        })?;

        Ok(row.into_user())
    }

    async fn adjust_score(&self, user_id: i64, delta: i32, won: bool) -> Result<(), AppError> {
        let query = if won {
            "UPDATE users SET score = score + $1, win_count = win_count + 1 WHERE id = $2"
        } else {
            "UPDATE users SET score = score + $1, lose_count = lose_count + 1 WHERE id = $2"
        };

        sqlx::query(query)
            .bind(delta)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn leaderboard_page(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password, score, win_count, lose_count, created_at
            FROM users
            ORDER BY score DESC, id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserRow::into_user).collect())
    }

    async fn rank_of(&self, user_id: i64) -> Result<i64, AppError> {
        let rank: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) + 1
            FROM users
            WHERE score > (SELECT score FROM users WHERE id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(rank)
    }
}
