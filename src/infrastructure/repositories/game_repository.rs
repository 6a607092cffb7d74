//! Game Record Repository Implementation
//!
//! Writes the `games` audit table: one row per match, stamped with the
//! result when the game ends. Nothing in the core reads it back.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::GameRecordRepository;
use crate::shared::error::AppError;

#[derive(Clone)]
pub struct PgGameRecordRepository {
    pool: PgPool,
}

impl PgGameRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GameRecordRepository for PgGameRecordRepository {
    async fn create(&self, room_id: i64, black: i64, white: i64) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO games (room_id, black_player_id, white_player_id, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id
            "#,
        )
        .bind(room_id)
        .bind(black)
        .bind(white)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn finish_by_room(
        &self,
        room_id: i64,
        winner_id: i64,
        board_state: &str,
    ) -> Result<(), AppError> {
        // Stamp the newest record for the room; restarted rooms keep one
        // row per match.
        sqlx::query(
            r#"
            UPDATE games
            SET winner_id = $1, board_state = $2::jsonb, ended_at = NOW()
            WHERE id = (
                SELECT id FROM games
                WHERE room_id = $3
                ORDER BY id DESC
                LIMIT 1
            )
            "#,
        )
        .bind(winner_id)
        .bind(board_state)
        .bind(room_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
