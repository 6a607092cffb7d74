//! Repository implementations backed by PostgreSQL.

mod game_repository;
mod user_repository;

pub use game_repository::PgGameRecordRepository;
pub use user_repository::PgUserRepository;
