//! Rank Service
//!
//! Leaderboard paging and per-user rank lookups on top of the user
//! repository.

use std::sync::Arc;

use crate::domain::UserRepository;
use crate::protocol::message::RankEntry;
use crate::shared::error::AppError;

/// Page size used when the client sends no (or a non-positive) limit.
pub const DEFAULT_LIMIT: i64 = 10;

/// Hard cap on a single leaderboard page.
pub const MAX_LIMIT: i64 = 100;

pub struct RankService {
    users: Arc<dyn UserRepository>,
}

impl RankService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// One leaderboard page with contiguous ranks starting at
    /// `offset + 1`. The limit is clamped to `[1, 100]`.
    pub async fn get_leaderboard(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RankEntry>, AppError> {
        let limit = clamp_limit(limit);
        let offset = offset.max(0);

        let users = self.users.leaderboard_page(limit, offset).await?;

        Ok(users
            .into_iter()
            .enumerate()
            .map(|(i, user)| RankEntry {
                user_id: user.id,
                username: user.username,
                score: user.score,
                win_count: user.win_count,
                lose_count: user.lose_count,
                win_rate: win_rate(user.win_count, user.lose_count),
                rank: offset + 1 + i as i64,
            })
            .collect())
    }

    /// `1 + count(users with a strictly greater score)`; tied users share
    /// the lower numerical rank.
    pub async fn get_user_rank(&self, user_id: i64) -> Result<i64, AppError> {
        self.users.rank_of(user_id).await
    }
}

fn clamp_limit(limit: i64) -> i64 {
    if limit <= 0 {
        DEFAULT_LIMIT
    } else {
        limit.min(MAX_LIMIT)
    }
}

/// Win percentage with one decimal, `"0.0%"` before the first game.
pub fn win_rate(wins: i32, losses: i32) -> String {
    let total = wins + losses;
    if total == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", wins as f64 / total as f64 * 100.0)
}
