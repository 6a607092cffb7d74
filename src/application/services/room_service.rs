//! Room Registry
//!
//! In-memory room bookkeeping. One lock guards the map and every room in
//! it; reads take the shared side and hand out copies, so no caller ever
//! holds a reference into the registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;

use crate::domain::{Room, RoomStatus};

/// Room membership errors. The display strings go to clients verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room not found")]
    RoomNotFound,

    #[error("room is full")]
    RoomFull,

    #[error("already in room")]
    AlreadyInRoom,

    #[error("not in room")]
    NotInRoom,
}

pub struct RoomRegistry {
    rooms: RwLock<HashMap<i64, Room>>,
    next_id: AtomicI64,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Allocate an id and create a Waiting room containing its creator.
    pub fn create_room(&self, name: String, creator_id: i64) -> Room {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let room = Room::new(id, name, creator_id);
        self.rooms
            .write()
            .expect("room registry lock poisoned")
            .insert(id, room.clone());
        room
    }

    pub fn get_room(&self, room_id: i64) -> Result<Room, RoomError> {
        self.rooms
            .read()
            .expect("room registry lock poisoned")
            .get(&room_id)
            .cloned()
            .ok_or(RoomError::RoomNotFound)
    }

    /// Add a player; returns the updated room so callers can check for a
    /// full house without re-locking.
    pub fn join_room(&self, room_id: i64, user_id: i64) -> Result<Room, RoomError> {
        let mut rooms = self.rooms.write().expect("room registry lock poisoned");
        let room = rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;

        if room.has_player(user_id) {
            return Err(RoomError::AlreadyInRoom);
        }
        if room.is_full() {
            return Err(RoomError::RoomFull);
        }
        room.add_player(user_id);
        Ok(room.clone())
    }

    /// Remove a player; a room left empty is deleted.
    pub fn leave_room(&self, room_id: i64, user_id: i64) -> Result<(), RoomError> {
        let mut rooms = self.rooms.write().expect("room registry lock poisoned");
        let room = rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;

        if !room.remove_player(user_id) {
            return Err(RoomError::NotInRoom);
        }
        if room.is_empty() {
            rooms.remove(&room_id);
        }
        Ok(())
    }

    pub fn set_status(&self, room_id: i64, status: RoomStatus) -> Result<(), RoomError> {
        let mut rooms = self.rooms.write().expect("room registry lock poisoned");
        let room = rooms.get_mut(&room_id).ok_or(RoomError::RoomNotFound)?;
        room.status = status;
        Ok(())
    }

    /// Copy of the member list, snapshotted under the lock.
    pub fn players(&self, room_id: i64) -> Result<Vec<i64>, RoomError> {
        self.rooms
            .read()
            .expect("room registry lock poisoned")
            .get(&room_id)
            .map(|r| r.players.clone())
            .ok_or(RoomError::RoomNotFound)
    }

    /// Snapshot of the rooms still waiting for an opponent.
    pub fn list_waiting(&self) -> Vec<Room> {
        let rooms = self.rooms.read().expect("room registry lock poisoned");
        let mut waiting: Vec<Room> = rooms
            .values()
            .filter(|r| r.status == RoomStatus::Waiting)
            .cloned()
            .collect();
        waiting.sort_by_key(|r| r.id);
        waiting
    }

    /// Drop Waiting single-player rooms older than `timeout`. Returns the
    /// number deleted.
    pub fn clean_inactive(&self, timeout: Duration) -> usize {
        let mut rooms = self.rooms.write().expect("room registry lock poisoned");
        let now = Utc::now();
        let cutoff = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::zero());

        let stale: Vec<i64> = rooms
            .values()
            .filter(|r| {
                r.status == RoomStatus::Waiting
                    && r.players.len() == 1
                    && now - r.created_at > cutoff
            })
            .map(|r| r.id)
            .collect();

        for id in &stale {
            rooms.remove(id);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.rooms.read().expect("room registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
