//! Game Registry
//!
//! Active games keyed by room id. Engine mutation happens under the
//! registry lock, and every mutating call returns a snapshot of what the
//! caller needs so nothing re-locks (or races) to read the result.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::{Game, GameError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GameRegistryError {
    #[error("game not found")]
    GameNotFound,

    #[error("room already has a game")]
    RoomAlreadyInGame,
}

/// Errors out of [`GameRegistry::make_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error(transparent)]
    Registry(#[from] GameRegistryError),

    #[error(transparent)]
    Rule(#[from] GameError),
}

/// Everything the connection handler needs after a successful move,
/// captured while the registry lock was held.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub board: Vec<Vec<u8>>,
    pub x: i32,
    pub y: i32,
    pub player: i64,
    pub current_player: i64,
    pub finished: bool,
    pub winner: i64,
    pub win_line: Vec<usize>,
    pub players: [i64; 2],
}

/// Result of a forfeit attempt. `winner == 0` means there was nothing to
/// forfeit (already finished, or the caller was not a participant).
#[derive(Debug, Clone, Copy)]
pub struct ForfeitOutcome {
    pub winner: i64,
    pub players: [i64; 2],
}

#[derive(Default)]
pub struct GameRegistry {
    games: Mutex<HashMap<i64, Game>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self {
            games: Mutex::new(HashMap::new()),
        }
    }

    /// Construct the engine for a freshly filled room. Fails when the
    /// room already has a live game.
    pub fn start_game(&self, room_id: i64, players: [i64; 2]) -> Result<Game, GameRegistryError> {
        let mut games = self.games.lock().expect("game registry lock poisoned");
        if games.contains_key(&room_id) {
            return Err(GameRegistryError::RoomAlreadyInGame);
        }
        let game = Game::new(room_id, players);
        games.insert(room_id, game.clone());
        Ok(game)
    }

    /// Validate and apply a move, running win detection under the lock.
    pub fn make_move(
        &self,
        room_id: i64,
        player_id: i64,
        x: i32,
        y: i32,
    ) -> Result<MoveOutcome, MoveError> {
        let mut games = self.games.lock().expect("game registry lock poisoned");
        let game = games
            .get_mut(&room_id)
            .ok_or(GameRegistryError::GameNotFound)?;

        game.make_move(player_id, x, y)?;

        Ok(MoveOutcome {
            board: game.board_copy(),
            x,
            y,
            player: player_id,
            current_player: game.current_player(),
            finished: game.is_finished(),
            winner: game.winner(),
            win_line: game.win_line().to_vec(),
            players: game.players(),
        })
    }

    /// Forfeit on behalf of `player_id`.
    pub fn forfeit(&self, room_id: i64, player_id: i64) -> Result<ForfeitOutcome, GameRegistryError> {
        let mut games = self.games.lock().expect("game registry lock poisoned");
        let game = games
            .get_mut(&room_id)
            .ok_or(GameRegistryError::GameNotFound)?;

        let winner = game.forfeit(player_id);
        Ok(ForfeitOutcome {
            winner,
            players: game.players(),
        })
    }

    /// Final board snapshot, or `None` when the game is gone.
    pub fn board(&self, room_id: i64) -> Option<Vec<Vec<u8>>> {
        self.games
            .lock()
            .expect("game registry lock poisoned")
            .get(&room_id)
            .map(|g| g.board_copy())
    }

    /// Whether the room has a game that is still being played.
    pub fn is_active(&self, room_id: i64) -> bool {
        self.games
            .lock()
            .expect("game registry lock poisoned")
            .get(&room_id)
            .is_some_and(|g| !g.is_finished())
    }

    /// Unconditionally discard the game for a room.
    pub fn end_game(&self, room_id: i64) {
        self.games
            .lock()
            .expect("game registry lock poisoned")
            .remove(&room_id);
    }

    pub fn len(&self) -> usize {
        self.games.lock().expect("game registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
