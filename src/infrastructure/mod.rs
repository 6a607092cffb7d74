//! # Infrastructure Layer
//!
//! External-service adapters: the PostgreSQL pool and repositories, and
//! the Redis session/presence store.

pub mod cache;
pub mod database;
pub mod repositories;
