//! Configuration management.

mod settings;

pub use settings::{DatabaseSettings, GameSettings, RedisSettings, ServerSettings, Settings};
