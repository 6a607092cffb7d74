//! Gomoku game engine.
//!
//! Pure board state and rules: turn order, move legality, five-in-a-row
//! detection, draw and forfeit resolution. No I/O and no locking; the
//! game registry serializes access.

use thiserror::Error;

/// Board edge length.
pub const BOARD_SIZE: usize = 15;

/// Total cells; a game with this many moves and no winner is a draw.
pub const MAX_MOVES: usize = BOARD_SIZE * BOARD_SIZE;

/// Rule violations reported by [`Game::make_move`]. The display strings
/// go to clients verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("not your turn")]
    NotYourTurn,

    #[error("invalid position")]
    InvalidPosition,

    #[error("cell already occupied")]
    CellOccupied,

    #[error("game not started")]
    GameNotStarted,

    #[error("game already over")]
    GameAlreadyOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Playing,
    Finished,
}

/// Authoritative state of one match between exactly two players.
#[derive(Debug, Clone)]
pub struct Game {
    room_id: i64,
    board: [[u8; BOARD_SIZE]; BOARD_SIZE],
    players: [i64; 2],
    current: usize,
    state: GameState,
    winner: i64,
    win_line: Vec<usize>,
    move_count: usize,
}

impl Game {
    /// Start a game: zeroed board, first listed player to move.
    pub fn new(room_id: i64, players: [i64; 2]) -> Self {
        Self {
            room_id,
            board: [[0; BOARD_SIZE]; BOARD_SIZE],
            players,
            current: 0,
            state: GameState::Playing,
            winner: 0,
            win_line: Vec::new(),
            move_count: 0,
        }
    }

    pub fn room_id(&self) -> i64 {
        self.room_id
    }

    pub fn players(&self) -> [i64; 2] {
        self.players
    }

    /// The player whose turn it is. Zero once the game is over and the
    /// turn no longer advances.
    pub fn current_player(&self) -> i64 {
        self.players[self.current]
    }

    pub fn winner(&self) -> i64 {
        self.winner
    }

    /// Linear indices (`x * 15 + y`) of the winning run; empty unless the
    /// game ended by five-in-a-row.
    pub fn win_line(&self) -> &[usize] {
        &self.win_line
    }

    pub fn move_count(&self) -> usize {
        self.move_count
    }

    pub fn is_finished(&self) -> bool {
        self.state == GameState::Finished
    }

    pub fn is_draw(&self) -> bool {
        self.state == GameState::Finished && self.winner == 0
    }

    /// Deep copy for marshalling; callers never alias engine state.
    pub fn board_copy(&self) -> Vec<Vec<u8>> {
        self.board.iter().map(|row| row.to_vec()).collect()
    }

    fn in_bounds(x: i32, y: i32) -> bool {
        (0..BOARD_SIZE as i32).contains(&x) && (0..BOARD_SIZE as i32).contains(&y)
    }

    /// Place a stone for `player_id` at `(x, y)`.
    ///
    /// On success the move either ends the game (win or draw) or passes
    /// the turn. Failed moves leave the game untouched.
    pub fn make_move(&mut self, player_id: i64, x: i32, y: i32) -> Result<(), GameError> {
        if self.state != GameState::Playing {
            return Err(GameError::GameNotStarted);
        }
        if self.winner != 0 {
            return Err(GameError::GameAlreadyOver);
        }
        if self.current_player() != player_id {
            return Err(GameError::NotYourTurn);
        }
        if !Self::in_bounds(x, y) {
            return Err(GameError::InvalidPosition);
        }
        if self.board[x as usize][y as usize] != 0 {
            return Err(GameError::CellOccupied);
        }

        let stone = self.current as u8 + 1;
        self.board[x as usize][y as usize] = stone;
        self.move_count += 1;

        if self.check_win(x, y, stone) {
            self.winner = player_id;
            self.state = GameState::Finished;
        } else if self.move_count >= MAX_MOVES {
            self.state = GameState::Finished;
        } else {
            self.current = 1 - self.current;
        }

        Ok(())
    }

    /// Run detection centred on the placed stone, one axis at a time in a
    /// fixed order so the recorded line is deterministic.
    fn check_win(&mut self, x: i32, y: i32, stone: u8) -> bool {
        const AXES: [(i32, i32); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

        for (dx, dy) in AXES {
            let mut count = 1usize;
            let mut line = vec![x as usize * BOARD_SIZE + y as usize];

            for i in 1..5 {
                let (nx, ny) = (x + dx * i, y + dy * i);
                if !Self::in_bounds(nx, ny) || self.board[nx as usize][ny as usize] != stone {
                    break;
                }
                count += 1;
                line.push(nx as usize * BOARD_SIZE + ny as usize);
            }
            for i in 1..5 {
                let (nx, ny) = (x - dx * i, y - dy * i);
                if !Self::in_bounds(nx, ny) || self.board[nx as usize][ny as usize] != stone {
                    break;
                }
                count += 1;
                line.push(nx as usize * BOARD_SIZE + ny as usize);
            }

            if count >= 5 {
                self.win_line = line;
                return true;
            }
        }

        false
    }

    /// Concede. Returns the winner's id, or 0 when the caller is not a
    /// participant or the game is already over (no state change).
    pub fn forfeit(&mut self, player_id: i64) -> i64 {
        if self.state != GameState::Playing {
            return 0;
        }
        let Some(idx) = self.players.iter().position(|&p| p == player_id) else {
            return 0;
        };

        let winner = self.players[1 - idx];
        self.winner = winner;
        self.state = GameState::Finished;
        winner
    }
}
