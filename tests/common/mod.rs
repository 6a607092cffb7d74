//! Common Test Utilities
//!
//! In-memory store fakes and a loopback harness that drives the real
//! connection handler over the real binary framing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::time::timeout;

use gomoku_server::domain::{
    GameRecordRepository, Session, SessionStore, User, UserRepository, INITIAL_SCORE,
};
use gomoku_server::presentation::connection::{
    serve_connection, BinaryFrameSink, BinaryFrameSource,
};
use gomoku_server::protocol::{msg_type, packet, Frame};
use gomoku_server::shared::error::AppError;
use gomoku_server::startup::ServerState;

/// Single-mutex user store: the check-and-insert in `create` is atomic,
/// which is exactly the uniqueness guarantee the database gives.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<Vec<User>>,
    next_id: AtomicI64,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn get(&self, user_id: i64) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.get(id))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, username: &str, password_hash: &str) -> Result<User, AppError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!(
                "username '{username}' already taken"
            )));
        }
        let user = User {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            score: INITIAL_SCORE,
            win_count: 0,
            lose_count: 0,
            created_at: Utc::now(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn adjust_score(&self, user_id: i64, delta: i32, won: bool) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("user {user_id}")))?;
        user.score += delta;
        if won {
            user.win_count += 1;
        } else {
            user.lose_count += 1;
        }
        Ok(())
    }

    async fn leaderboard_page(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let mut users = self.users.lock().unwrap().clone();
        users.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(users
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn rank_of(&self, user_id: i64) -> Result<i64, AppError> {
        let users = self.users.lock().unwrap();
        let score = users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.score)
            .unwrap_or(i32::MIN);
        Ok(1 + users.iter().filter(|u| u.score > score).count() as i64)
    }
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    online: Mutex<HashMap<i64, String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn online_users(&self) -> Vec<i64> {
        self.online.lock().unwrap().keys().copied().collect()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &Session) -> Result<(), AppError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn validate(&self, token: &str) -> Result<Option<Session>, AppError> {
        Ok(self.sessions.lock().unwrap().get(token).cloned())
    }

    async fn refresh(&self, _token: &str) -> Result<(), AppError> {
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<(), AppError> {
        self.sessions.lock().unwrap().remove(token);
        Ok(())
    }

    async fn set_user_online(&self, user_id: i64, token: &str) -> Result<(), AppError> {
        self.online.lock().unwrap().insert(user_id, token.to_string());
        Ok(())
    }

    async fn set_user_offline(&self, user_id: i64) -> Result<(), AppError> {
        self.online.lock().unwrap().remove(&user_id);
        Ok(())
    }

    async fn is_user_online(&self, user_id: i64) -> Result<bool, AppError> {
        Ok(self.online.lock().unwrap().contains_key(&user_id))
    }
}

#[derive(Debug, Clone)]
pub struct RecordedGame {
    pub room_id: i64,
    pub black: i64,
    pub white: i64,
    pub winner: Option<i64>,
}

#[derive(Default)]
pub struct InMemoryGameRecords {
    records: Mutex<Vec<RecordedGame>>,
}

impl InMemoryGameRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<RecordedGame> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl GameRecordRepository for InMemoryGameRecords {
    async fn create(&self, room_id: i64, black: i64, white: i64) -> Result<i64, AppError> {
        let mut records = self.records.lock().unwrap();
        records.push(RecordedGame {
            room_id,
            black,
            white,
            winner: None,
        });
        Ok(records.len() as i64)
    }

    async fn finish_by_room(
        &self,
        room_id: i64,
        winner_id: i64,
        _board_state: &str,
    ) -> Result<(), AppError> {
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().rev().find(|r| r.room_id == room_id) {
            record.winner = Some(winner_id);
        }
        Ok(())
    }
}

/// Fully wired server state over the in-memory fakes, with direct access
/// to the fakes for assertions.
pub struct TestEnv {
    pub state: Arc<ServerState>,
    pub users: Arc<InMemoryUserRepository>,
    pub sessions: Arc<InMemorySessionStore>,
    pub records: Arc<InMemoryGameRecords>,
}

pub fn test_env() -> TestEnv {
    let users = Arc::new(InMemoryUserRepository::new());
    let sessions = Arc::new(InMemorySessionStore::new());
    let records = Arc::new(InMemoryGameRecords::new());
    let state = ServerState::new(users.clone(), records.clone(), sessions.clone());
    TestEnv {
        state,
        users,
        sessions,
        records,
    }
}

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// A protocol-speaking client connected to the real handler over an
/// in-memory duplex pipe. Dropping it is an abrupt disconnect.
pub struct TestClient {
    read: ReadHalf<DuplexStream>,
    write: WriteHalf<DuplexStream>,
    seq: u16,
}

impl TestClient {
    /// Open a loopback connection served by `serve_connection`.
    pub async fn connect(env: &TestEnv) -> Self {
        let (client_io, server_io) = tokio::io::duplex(256 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        tokio::spawn(serve_connection(
            env.state.clone(),
            BinaryFrameSource::new(server_read),
            BinaryFrameSink::new(server_write),
            "loopback".to_string(),
        ));

        let (read, write) = tokio::io::split(client_io);
        Self { read, write, seq: 0 }
    }

    /// Send one frame; returns the sequence number used.
    pub async fn send(&mut self, msg_type: u16, payload: serde_json::Value) -> u16 {
        self.seq = self.seq.wrapping_add(1);
        let body = serde_json::to_vec(&payload).expect("encode payload");
        let frame = Frame::new(msg_type, self.seq, body);
        self.write
            .write_all(&frame.encode().expect("encode frame"))
            .await
            .expect("write frame");
        self.seq
    }

    /// Send raw bytes, bypassing the frame encoder.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.write.write_all(bytes).await.expect("write bytes");
    }

    pub async fn recv(&mut self) -> Frame {
        timeout(RECV_TIMEOUT, packet::read_frame(&mut self.read))
            .await
            .expect("timed out waiting for frame")
            .expect("transport error")
            .expect("connection closed")
    }

    /// Receive one frame and check its type, returning the parsed payload.
    pub async fn recv_type(&mut self, expected: u16) -> serde_json::Value {
        let frame = self.recv().await;
        let payload: serde_json::Value =
            serde_json::from_slice(&frame.payload).expect("payload is JSON");
        assert_eq!(
            frame.msg_type, expected,
            "expected type {expected}, got {} with payload {payload}",
            frame.msg_type
        );
        payload
    }

    /// Receive one frame, asserting type and echoed sequence number.
    pub async fn recv_reply(&mut self, expected: u16, seq: u16) -> serde_json::Value {
        let frame = self.recv().await;
        assert_eq!(frame.msg_type, expected, "unexpected message type");
        assert_eq!(frame.seq, seq, "response must echo the request seq");
        serde_json::from_slice(&frame.payload).expect("payload is JSON")
    }

    /// True when the server has closed this connection.
    pub async fn closed(&mut self) -> bool {
        matches!(
            timeout(RECV_TIMEOUT, packet::read_frame(&mut self.read)).await,
            Ok(Ok(None))
        )
    }

    // --- Protocol shorthands --------------------------------------------

    pub async fn register(&mut self, username: &str, password: &str) -> serde_json::Value {
        let seq = self
            .send(
                msg_type::REGISTER,
                serde_json::json!({ "username": username, "password": password }),
            )
            .await;
        self.recv_reply(msg_type::REGISTER_RESP, seq).await
    }

    /// Register + credential login; panics unless both succeed. Returns
    /// `(user_id, token)`.
    pub async fn register_and_login(&mut self, username: &str, password: &str) -> (i64, String) {
        let resp = self.register(username, password).await;
        assert_eq!(resp["code"], 200, "register failed: {resp}");

        let seq = self
            .send(
                msg_type::LOGIN,
                serde_json::json!({ "username": username, "password": password }),
            )
            .await;
        let resp = self.recv_reply(msg_type::LOGIN_RESP, seq).await;
        assert_eq!(resp["code"], 200, "login failed: {resp}");
        (
            resp["user_id"].as_i64().expect("user_id"),
            resp["token"].as_str().expect("token").to_string(),
        )
    }

    pub async fn create_room(&mut self, name: &str) -> i64 {
        let seq = self
            .send(msg_type::CREATE_ROOM, serde_json::json!({ "room_name": name }))
            .await;
        let resp = self.recv_reply(msg_type::CREATE_ROOM_RESP, seq).await;
        assert_eq!(resp["code"], 200, "create room failed: {resp}");
        resp["room_id"].as_i64().expect("room_id")
    }

    pub async fn join_room(&mut self, room_id: i64) -> serde_json::Value {
        let seq = self
            .send(msg_type::JOIN_ROOM, serde_json::json!({ "room_id": room_id }))
            .await;
        self.recv_reply(msg_type::JOIN_ROOM_RESP, seq).await
    }

    /// Send a move and return the MoveResp payload (the caller reads any
    /// broadcasts separately).
    pub async fn send_move(&mut self, room_id: i64, x: i32, y: i32) -> serde_json::Value {
        let seq = self
            .send(
                msg_type::MOVE,
                serde_json::json!({ "room_id": room_id, "x": x, "y": y }),
            )
            .await;
        self.recv_reply(msg_type::MOVE_RESP, seq).await
    }

    pub async fn ping(&mut self) {
        let seq = self.send(msg_type::PING, serde_json::json!({})).await;
        self.recv_reply(msg_type::PONG, seq).await;
    }
}

/// Unique username per call, for tests sharing an environment.
pub fn unique_username() -> String {
    format!("user_{}", &uuid::Uuid::new_v4().simple().to_string()[..10])
}

/// Board fill order that provably ends in a draw: stone colors follow
/// `[1,1,2,2]` indexed by `(x + 2y) mod 4` (no run longer than two in any
/// axis), interleaved color by color so turns stay legal.
pub fn draw_sequence() -> Vec<(i32, i32)> {
    let board_size = 15usize;
    let color = |x: usize, y: usize| -> u8 {
        match (x + 2 * y) % 4 {
            0 | 1 => 1,
            _ => 2,
        }
    };

    let mut first = Vec::new();
    let mut second = Vec::new();
    for x in 0..board_size {
        for y in 0..board_size {
            if color(x, y) == 1 {
                first.push((x as i32, y as i32));
            } else {
                second.push((x as i32, y as i32));
            }
        }
    }

    let total = board_size * board_size;
    let mut seq = Vec::with_capacity(total);
    for i in 0..total {
        if i % 2 == 0 {
            seq.push(first[i / 2]);
        } else {
            seq.push(second[i / 2]);
        }
    }
    seq
}
