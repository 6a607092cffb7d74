//! Application Startup
//!
//! Shared server state wiring and the Application that drives the TCP
//! acceptor, the HTTP/WebSocket server and the room janitor.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::application::{AuthService, GameRegistry, RankService, RoomRegistry};
use crate::config::Settings;
use crate::domain::{GameRecordRepository, SessionStore, UserRepository};
use crate::infrastructure::repositories::{PgGameRecordRepository, PgUserRepository};
use crate::infrastructure::{cache, database};
use crate::presentation::hub::Hub;
use crate::presentation::{tcp, websocket};

/// Everything a connection handler needs, shared across all connections.
pub struct ServerState {
    pub users: Arc<dyn UserRepository>,
    pub game_records: Arc<dyn GameRecordRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub auth: AuthService,
    pub rank: RankService,
    pub rooms: RoomRegistry,
    pub games: GameRegistry,
    pub hub: Hub,
}

impl ServerState {
    /// Wire the services around the given store adapters. Tests pass
    /// in-memory fakes here; production passes Postgres and Redis.
    pub fn new(
        users: Arc<dyn UserRepository>,
        game_records: Arc<dyn GameRecordRepository>,
        sessions: Arc<dyn SessionStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            auth: AuthService::new(users.clone()),
            rank: RankService::new(users.clone()),
            users,
            game_records,
            sessions,
            rooms: RoomRegistry::new(),
            games: GameRegistry::new(),
            hub: Hub::new(),
        })
    }
}

/// Application instance
pub struct Application {
    tcp_listener: TcpListener,
    http_listener: TcpListener,
    router: Router,
    state: Arc<ServerState>,
    sweep_interval: Duration,
    room_idle_timeout: Duration,
}

impl Application {
    /// Build the application from settings.
    pub async fn build(settings: Settings) -> Result<Self> {
        let db = database::create_pool(&settings.database).await?;
        let redis = cache::create_redis_client(&settings.redis).await?;

        let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(db.clone()));
        let game_records: Arc<dyn GameRecordRepository> =
            Arc::new(PgGameRecordRepository::new(db));
        let sessions: Arc<dyn SessionStore> = Arc::new(cache::RedisSessionStore::new(redis));

        let state = ServerState::new(users, game_records, sessions);
        let router = http_router(state.clone());

        let tcp_addr = format!("{}:{}", settings.server.host, settings.server.tcp_port);
        let tcp_listener = TcpListener::bind(&tcp_addr).await?;
        info!(addr = %tcp_addr, "Game TCP listener bound");

        let http_addr = format!("{}:{}", settings.server.host, settings.server.http_port);
        let http_listener = TcpListener::bind(&http_addr).await?;
        info!(addr = %http_addr, "HTTP/WebSocket listener bound");

        Ok(Self {
            tcp_listener,
            http_listener,
            router,
            state,
            sweep_interval: Duration::from_secs(settings.game.room_sweep_interval_secs),
            room_idle_timeout: Duration::from_secs(settings.game.room_idle_timeout_secs),
        })
    }

    /// Run the acceptor loop, the HTTP server and the janitor until the
    /// process stops.
    pub async fn run_until_stopped(self) -> Result<()> {
        let acceptor = tokio::spawn(tcp::run_acceptor(self.tcp_listener, self.state.clone()));
        let janitor = tokio::spawn(room_janitor(
            self.state.clone(),
            self.sweep_interval,
            self.room_idle_timeout,
        ));

        let result = axum::serve(self.http_listener, self.router).await;

        acceptor.abort();
        janitor.abort();
        result?;
        Ok(())
    }

    pub fn tcp_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.tcp_listener.local_addr()
    }

    pub fn http_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.http_listener.local_addr()
    }
}

/// Router for the HTTP surface: the WebSocket upgrade and a liveness
/// probe.
pub fn http_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/ws", get(websocket::ws_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Periodically drop Waiting rooms whose single occupant never found an
/// opponent.
async fn room_janitor(state: Arc<ServerState>, every: Duration, idle_timeout: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let removed = state.rooms.clean_inactive(idle_timeout);
        if removed > 0 {
            info!(removed, "Cleaned inactive rooms");
        }
    }
}
