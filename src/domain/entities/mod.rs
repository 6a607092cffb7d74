//! Domain entities.

pub mod game;
pub mod room;
pub mod session;
pub mod user;

pub use game::{Game, GameError, GameState, BOARD_SIZE, MAX_MOVES};
pub use room::{Room, RoomStatus, ROOM_CAPACITY};
pub use session::{Session, SessionStore, SESSION_TTL_SECS};
pub use user::{
    GameRecordRepository, User, UserRepository, INITIAL_SCORE, LOSE_SCORE_DELTA, WIN_SCORE_DELTA,
};
