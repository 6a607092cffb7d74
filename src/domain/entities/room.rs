//! Room entity.
//!
//! A pairing container for up to two players. Lifecycle and locking live
//! in the room registry; this type only enforces membership rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capacity of a room; games are strictly two-player.
pub const ROOM_CAPACITY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

impl RoomStatus {
    /// Integer representation used on the wire.
    pub fn as_i32(self) -> i32 {
        match self {
            RoomStatus::Waiting => 0,
            RoomStatus::Playing => 1,
            RoomStatus::Finished => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub creator_id: i64,
    pub players: Vec<i64>,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(id: i64, name: String, creator_id: i64) -> Self {
        Self {
            id,
            name,
            creator_id,
            players: vec![creator_id],
            status: RoomStatus::Waiting,
            created_at: Utc::now(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= ROOM_CAPACITY
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn has_player(&self, user_id: i64) -> bool {
        self.players.contains(&user_id)
    }

    /// Append a player. Returns false (unchanged) when full or already
    /// present.
    pub fn add_player(&mut self, user_id: i64) -> bool {
        if self.is_full() || self.has_player(user_id) {
            return false;
        }
        self.players.push(user_id);
        true
    }

    /// Remove a player, keeping the join order of the rest.
    pub fn remove_player(&mut self, user_id: i64) -> bool {
        let before = self.players.len();
        self.players.retain(|&p| p != user_id);
        self.players.len() != before
    }

    /// The opponent of `user_id`, or 0 when alone.
    pub fn other_player(&self, user_id: i64) -> i64 {
        self.players
            .iter()
            .copied()
            .find(|&p| p != user_id)
            .unwrap_or(0)
    }
}
