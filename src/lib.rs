//! # Gomoku Game Server
//!
//! A multiplayer five-in-a-row server with:
//! - A framed binary protocol (length-prefixed JSON frames) over raw TCP
//! - The same message set over a WebSocket JSON envelope
//! - PostgreSQL for accounts and the scoreboard
//! - Redis for sessions and online presence
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture layering:
//!
//! - **Domain Layer**: the pure game engine, rooms, users, sessions, and
//!   the repository/store traits
//! - **Application Layer**: auth, the room and game registries, ranking
//! - **Infrastructure Layer**: Postgres and Redis adapters
//! - **Presentation Layer**: transport bindings, the shared connection
//!   handler, and the broadcast hub
//!
//! ## Module Structure
//!
//! ```text
//! gomoku_server/
//! +-- config/         Configuration management
//! +-- protocol/       Wire framing and the message registry
//! +-- domain/         Entities and data-access traits
//! +-- application/    Services
//! +-- infrastructure/ Database and cache implementations
//! +-- presentation/   TCP acceptor, WebSocket upgrade, handler, hub
//! +-- shared/         Common utilities (errors, validation)
//! ```

// Configuration module
pub mod config;

// Wire protocol - framing and message registry
pub mod protocol;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - Transports, handler, hub
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
