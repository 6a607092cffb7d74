//! Application services.

pub mod auth_service;
pub mod game_service;
pub mod rank_service;
pub mod room_service;

pub use auth_service::{generate_token, AuthError, AuthService};
pub use game_service::{
    ForfeitOutcome, GameRegistry, GameRegistryError, MoveError, MoveOutcome,
};
pub use rank_service::{win_rate, RankService};
pub use room_service::{RoomError, RoomRegistry};
