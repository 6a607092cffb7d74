//! # Application Layer
//!
//! Services orchestrating the domain: authentication, the in-memory room
//! and game registries, and ranking queries.

pub mod services;

pub use services::*;
