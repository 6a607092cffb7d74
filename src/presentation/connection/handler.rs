//! Connection Handler
//!
//! One instance per live transport, regardless of binding. Owns the read
//! loop, the auth gate, dispatch into the services, and the teardown path
//! that forfeits a live game when the peer vanishes.
//!
//! Outbound frames (responses and broadcasts alike) funnel through one
//! unbounded channel drained by a writer task, so every connection has
//! exactly one writer and frames never interleave.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::{AuthError, MoveError, RoomError};
use crate::domain::{Room, RoomStatus, Session, LOSE_SCORE_DELTA, WIN_SCORE_DELTA};
use crate::presentation::hub::ClientHandle;
use crate::protocol::message::{
    BoardUpdate, CreateRoomReq, CreateRoomResp, ForfeitResp, GameOver, GameStart, JoinRoomReq,
    JoinRoomResp, LeaderboardReq, LeaderboardResp, LeaveRoomResp, LoginReq, LoginResp, MoveReq,
    MoveResp, PlayerJoin, PlayerLeave, RegisterReq, RegisterResp, RoomInfo, RoomListResp,
    UserStatsReq, UserStatsResp,
};
use crate::protocol::{ClientMessage, Frame, ProtocolError, ServerMessage};
use crate::startup::ServerState;

use super::transport::{FrameSink, FrameSource};

/// Mutable per-connection state once authenticated. The hub holds the
/// shared [`ClientHandle`]; these fields belong to the read loop alone.
struct ConnSession {
    user_id: i64,
    username: String,
    token: String,
    room_id: i64,
    last_active: Instant,
    handle: Arc<ClientHandle>,
}

/// Drive one connection to completion: read frames, dispatch, tear down.
pub async fn serve_connection<S, K>(state: Arc<ServerState>, mut source: S, sink: K, peer: String)
where
    S: FrameSource,
    K: FrameSink + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    // Single writer per connection; responses and broadcasts are
    // serialized by the channel.
    let writer = tokio::spawn(async move {
        let mut sink = sink;
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send_frame(&frame).await {
                debug!(error = %e, "Write failed, stopping writer");
                break;
            }
        }
    });

    let mut conn = Connection {
        state,
        tx,
        peer,
        session: None,
    };
    debug!(peer = %conn.peer, "New connection");

    loop {
        match source.next_frame().await {
            Ok(Some(frame)) => conn.handle_frame(frame).await,
            Ok(None) => {
                debug!(peer = %conn.peer, "Connection closed by peer");
                break;
            }
            Err(e) if e.is_fatal() => {
                debug!(peer = %conn.peer, error = %e, "Transport error");
                break;
            }
            Err(e) => {
                // Recoverable envelope error (WebSocket binding): keep the
                // connection, tell the client.
                debug!(peer = %conn.peer, error = %e, "Malformed message");
                conn.reply(0, &ServerMessage::error(400, "invalid message format"));
            }
        }
    }

    conn.teardown().await;
    writer.abort();
}

struct Connection {
    state: Arc<ServerState>,
    tx: mpsc::UnboundedSender<Frame>,
    peer: String,
    session: Option<ConnSession>,
}

impl Connection {
    async fn handle_frame(&mut self, frame: Frame) {
        let msg = match ClientMessage::decode(frame.msg_type, &frame.payload) {
            Ok(msg) => msg,
            Err(ProtocolError::UnknownMsgType(code)) => {
                debug!(peer = %self.peer, code, "Unknown message type");
                self.reply(frame.seq, &ServerMessage::error(400, "unknown message type"));
                return;
            }
            Err(_) => {
                self.reply(frame.seq, &ServerMessage::error(400, "invalid payload"));
                return;
            }
        };

        if let Some(sess) = self.session.as_mut() {
            sess.last_active = Instant::now();
        }

        if self.session.is_none() && !msg.allowed_before_login() {
            self.reply(frame.seq, &ServerMessage::error(401, "please login first"));
            return;
        }

        let seq = frame.seq;
        match msg {
            ClientMessage::Ping => self.handle_ping(seq).await,
            ClientMessage::Login(req) => self.handle_login(seq, req).await,
            ClientMessage::Register(req) => self.handle_register(seq, req).await,
            ClientMessage::CreateRoom(req) => self.handle_create_room(seq, req),
            ClientMessage::JoinRoom(req) => self.handle_join_room(seq, req).await,
            ClientMessage::LeaveRoom(_) => self.handle_leave_room(seq).await,
            ClientMessage::RoomList => self.handle_room_list(seq),
            ClientMessage::Move(req) => self.handle_move(seq, req).await,
            ClientMessage::Forfeit(_) => self.handle_forfeit(seq).await,
            ClientMessage::Leaderboard(req) => self.handle_leaderboard(seq, req).await,
            ClientMessage::UserStats(req) => self.handle_user_stats(seq, req).await,
        }
    }

    /// Unicast a response to this connection, echoing the request `seq`.
    fn reply(&self, seq: u16, msg: &ServerMessage) {
        match msg.to_frame(seq) {
            Ok(frame) => {
                let _ = self.tx.send(frame);
            }
            Err(e) => warn!(peer = %self.peer, error = %e, "Failed to encode response"),
        }
    }

    /// Snapshot the player list under the room lock, release it, then fan
    /// out under the hub lock. Never the reverse order.
    fn broadcast_to_room(&self, room_id: i64, msg: &ServerMessage, exclude: i64) {
        let Ok(players) = self.state.rooms.players(room_id) else {
            return;
        };
        self.state.hub.broadcast_to_players(&players, msg, exclude);
    }

    fn identity(&self) -> Option<(i64, i64)> {
        self.session.as_ref().map(|s| (s.user_id, s.room_id))
    }

    fn set_room(&mut self, room_id: i64) {
        if let Some(sess) = self.session.as_mut() {
            sess.room_id = room_id;
        }
    }

    // --- Keepalive & auth -----------------------------------------------

    async fn handle_ping(&self, seq: u16) {
        if let Some(sess) = &self.session {
            if let Err(e) = self.state.sessions.refresh(&sess.token).await {
                warn!(user_id = sess.user_id, error = %e, "Session refresh failed");
            }
        }
        self.reply(seq, &ServerMessage::Pong);
    }

    async fn handle_login(&mut self, seq: u16, req: LoginReq) {
        // The token path wins whenever a token is present; an invalid
        // token does not fall back to credentials.
        if !req.token.is_empty() {
            self.login_with_token(seq, &req.token).await;
        } else {
            self.login_with_credentials(seq, &req.username, &req.password)
                .await;
        }
    }

    async fn login_with_token(&mut self, seq: u16, token: &str) {
        let sess = match self.state.sessions.validate(token).await {
            Ok(Some(sess)) => sess,
            Ok(None) => {
                self.reply(
                    seq,
                    &ServerMessage::LoginResp(LoginResp {
                        code: 401,
                        message: "invalid or expired token".into(),
                        ..Default::default()
                    }),
                );
                return;
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "Session lookup failed");
                self.reply(
                    seq,
                    &ServerMessage::LoginResp(LoginResp {
                        code: 500,
                        message: "session store unavailable".into(),
                        ..Default::default()
                    }),
                );
                return;
            }
        };

        if let Err(e) = self.state.sessions.refresh(token).await {
            warn!(user_id = sess.user_id, error = %e, "Session refresh failed");
        }

        self.finish_login(seq, sess.user_id, sess.username, sess.token, "login success via token")
            .await;
    }

    async fn login_with_credentials(&mut self, seq: u16, username: &str, password: &str) {
        let (user, token) = match self.state.auth.login(username, password).await {
            Ok(ok) => ok,
            Err(e @ (AuthError::UserNotFound | AuthError::InvalidPassword)) => {
                self.reply(
                    seq,
                    &ServerMessage::LoginResp(LoginResp {
                        code: 401,
                        message: e.to_string(),
                        ..Default::default()
                    }),
                );
                return;
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "Login failed");
                self.reply(
                    seq,
                    &ServerMessage::LoginResp(LoginResp {
                        code: 500,
                        message: "login failed".into(),
                        ..Default::default()
                    }),
                );
                return;
            }
        };

        let session = Session::new(user.id, user.username.clone(), token.clone());
        if let Err(e) = self.state.sessions.create(&session).await {
            warn!(user_id = user.id, error = %e, "Failed to create session");
            self.reply(
                seq,
                &ServerMessage::LoginResp(LoginResp {
                    code: 500,
                    message: "failed to create session".into(),
                    ..Default::default()
                }),
            );
            return;
        }

        self.finish_login(seq, user.id, user.username, token, "login success")
            .await;
    }

    /// Record the client in the hub, mark presence, and confirm.
    async fn finish_login(
        &mut self,
        seq: u16,
        user_id: i64,
        username: String,
        token: String,
        message: &str,
    ) {
        // A re-login on the same connection replaces the old identity.
        if let Some(prev) = self.session.take() {
            self.state.hub.remove(prev.user_id, &prev.handle);
        }

        let handle = Arc::new(ClientHandle {
            user_id,
            username: username.clone(),
            token: token.clone(),
            sender: self.tx.clone(),
        });
        self.state.hub.insert(handle.clone());

        if let Err(e) = self.state.sessions.set_user_online(user_id, &token).await {
            warn!(user_id, error = %e, "Failed to set presence");
        }

        self.session = Some(ConnSession {
            user_id,
            username,
            token: token.clone(),
            room_id: 0,
            last_active: Instant::now(),
            handle,
        });

        self.reply(
            seq,
            &ServerMessage::LoginResp(LoginResp {
                code: 200,
                message: message.into(),
                token,
                user_id,
            }),
        );
        info!(user_id, peer = %self.peer, "User logged in");
    }

    async fn handle_register(&mut self, seq: u16, req: RegisterReq) {
        match self.state.auth.register(&req.username, &req.password).await {
            Ok(user) => {
                self.reply(
                    seq,
                    &ServerMessage::RegisterResp(RegisterResp {
                        code: 200,
                        message: "register success".into(),
                        user_id: user.id,
                    }),
                );
                info!(user_id = user.id, username = %user.username, "User registered");
            }
            Err(e @ (AuthError::UserAlreadyExists | AuthError::InvalidInput(_))) => {
                self.reply(
                    seq,
                    &ServerMessage::RegisterResp(RegisterResp {
                        code: 400,
                        message: e.to_string(),
                        user_id: 0,
                    }),
                );
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "Registration failed");
                self.reply(
                    seq,
                    &ServerMessage::RegisterResp(RegisterResp {
                        code: 500,
                        message: "registration failed".into(),
                        user_id: 0,
                    }),
                );
            }
        }
    }

    // --- Rooms ----------------------------------------------------------

    fn handle_create_room(&mut self, seq: u16, req: CreateRoomReq) {
        let Some((user_id, room_id)) = self.identity() else {
            return;
        };
        if room_id != 0 {
            self.reply(
                seq,
                &ServerMessage::CreateRoomResp(CreateRoomResp {
                    code: 400,
                    message: "already in a room, please leave first".into(),
                    room_id: 0,
                }),
            );
            return;
        }

        let name = if req.room_name.is_empty() {
            let username = self
                .session
                .as_ref()
                .map(|s| s.username.clone())
                .unwrap_or_default();
            format!("{username}'s room")
        } else {
            req.room_name
        };

        let room = self.state.rooms.create_room(name, user_id);
        self.set_room(room.id);

        self.reply(
            seq,
            &ServerMessage::CreateRoomResp(CreateRoomResp {
                code: 200,
                message: "room created".into(),
                room_id: room.id,
            }),
        );
        info!(user_id, room_id = room.id, "Room created");
    }

    async fn handle_join_room(&mut self, seq: u16, req: JoinRoomReq) {
        let Some((user_id, room_id)) = self.identity() else {
            return;
        };
        if room_id != 0 {
            self.reply(
                seq,
                &ServerMessage::JoinRoomResp(JoinRoomResp {
                    code: 400,
                    message: "already in a room, please leave first".into(),
                    room_id: 0,
                }),
            );
            return;
        }

        let room = match self.state.rooms.join_room(req.room_id, user_id) {
            Ok(room) => room,
            Err(RoomError::RoomNotFound) => {
                self.reply(
                    seq,
                    &ServerMessage::JoinRoomResp(JoinRoomResp {
                        code: 404,
                        message: RoomError::RoomNotFound.to_string(),
                        room_id: 0,
                    }),
                );
                return;
            }
            Err(e) => {
                self.reply(
                    seq,
                    &ServerMessage::JoinRoomResp(JoinRoomResp {
                        code: 400,
                        message: e.to_string(),
                        room_id: 0,
                    }),
                );
                return;
            }
        };

        self.set_room(room.id);
        self.reply(
            seq,
            &ServerMessage::JoinRoomResp(JoinRoomResp {
                code: 200,
                message: "joined room".into(),
                room_id: room.id,
            }),
        );

        let username = self
            .session
            .as_ref()
            .map(|s| s.username.clone())
            .unwrap_or_default();
        self.broadcast_to_room(
            room.id,
            &ServerMessage::PlayerJoin(PlayerJoin {
                room_id: room.id,
                user_id,
                username,
            }),
            user_id,
        );
        info!(user_id, room_id = room.id, "Player joined room");

        if room.is_full() {
            self.start_game(&room).await;
        }
    }

    async fn start_game(&self, room: &Room) {
        let (black, white) = match room.players.as_slice() {
            &[a, b] => (a, b),
            _ => return,
        };

        let game = match self.state.games.start_game(room.id, [black, white]) {
            Ok(game) => game,
            Err(e) => {
                warn!(room_id = room.id, error = %e, "Failed to start game");
                return;
            }
        };

        if let Err(e) = self.state.rooms.set_status(room.id, RoomStatus::Playing) {
            warn!(room_id = room.id, error = %e, "Failed to mark room playing");
        }
        if let Err(e) = self.state.game_records.create(room.id, black, white).await {
            warn!(room_id = room.id, error = %e, "Failed to record game start");
        }

        self.broadcast_to_room(
            room.id,
            &ServerMessage::GameStart(GameStart {
                room_id: room.id,
                players: vec![black, white],
                first_player: game.current_player(),
            }),
            0,
        );
        info!(
            room_id = room.id,
            first_player = game.current_player(),
            "Game started"
        );
    }

    async fn handle_leave_room(&mut self, seq: u16) {
        let Some((user_id, room_id)) = self.identity() else {
            return;
        };
        if room_id == 0 {
            self.reply(
                seq,
                &ServerMessage::LeaveRoomResp(LeaveRoomResp {
                    code: 400,
                    message: "not in any room".into(),
                }),
            );
            return;
        }

        if self.state.rooms.get_room(room_id).is_err() {
            // The room is already gone (e.g. swept); just detach.
            self.set_room(0);
            self.reply(
                seq,
                &ServerMessage::LeaveRoomResp(LeaveRoomResp {
                    code: 200,
                    message: "left room".into(),
                }),
            );
            return;
        }

        // Walking out of a live game concedes it.
        self.forfeit_live_game(room_id, user_id).await;

        self.broadcast_to_room(
            room_id,
            &ServerMessage::PlayerLeave(PlayerLeave {
                room_id,
                user_id,
                reason: "player left".into(),
            }),
            0,
        );

        match self.state.rooms.leave_room(room_id, user_id) {
            Ok(()) => {
                self.set_room(0);
                self.reply(
                    seq,
                    &ServerMessage::LeaveRoomResp(LeaveRoomResp {
                        code: 200,
                        message: "left room".into(),
                    }),
                );
                info!(user_id, room_id, "Player left room");
            }
            Err(e) => {
                self.reply(
                    seq,
                    &ServerMessage::LeaveRoomResp(LeaveRoomResp {
                        code: 400,
                        message: e.to_string(),
                    }),
                );
            }
        }
    }

    fn handle_room_list(&self, seq: u16) {
        let rooms = self
            .state
            .rooms
            .list_waiting()
            .into_iter()
            .map(|room| RoomInfo {
                room_id: room.id,
                room_name: room.name,
                players: room.players,
                creator_id: room.creator_id,
                status: room.status.as_i32(),
            })
            .collect();

        self.reply(
            seq,
            &ServerMessage::RoomListResp(RoomListResp {
                code: 200,
                message: "success".into(),
                rooms,
            }),
        );
    }

    // --- Gameplay -------------------------------------------------------

    async fn handle_move(&mut self, seq: u16, req: MoveReq) {
        let Some((user_id, room_id)) = self.identity() else {
            return;
        };
        if room_id == 0 {
            self.reply(
                seq,
                &ServerMessage::MoveResp(MoveResp {
                    code: 400,
                    message: "not in any room".into(),
                    ..Default::default()
                }),
            );
            return;
        }

        // (1) validate and apply under the game-registry lock
        let outcome = match self.state.games.make_move(room_id, user_id, req.x, req.y) {
            Ok(outcome) => outcome,
            Err(MoveError::Registry(_)) => {
                self.reply(
                    seq,
                    &ServerMessage::MoveResp(MoveResp {
                        code: 404,
                        message: "game not found".into(),
                        ..Default::default()
                    }),
                );
                return;
            }
            Err(MoveError::Rule(e)) => {
                self.reply(
                    seq,
                    &ServerMessage::MoveResp(MoveResp {
                        code: 400,
                        message: e.to_string(),
                        ..Default::default()
                    }),
                );
                return;
            }
        };

        // (2) confirm to the mover before any broadcast
        self.reply(
            seq,
            &ServerMessage::MoveResp(MoveResp {
                code: 200,
                message: "move success".into(),
                x: outcome.x,
                y: outcome.y,
                player: user_id,
            }),
        );

        // (3) both players see the new board
        self.broadcast_to_room(
            room_id,
            &ServerMessage::BoardUpdate(BoardUpdate {
                room_id,
                board: outcome.board,
                last_x: outcome.x,
                last_y: outcome.y,
                last_player: user_id,
                current_player: outcome.current_player,
            }),
            0,
        );

        // (4) and, if that move ended it, the result
        if outcome.finished {
            self.broadcast_to_room(
                room_id,
                &ServerMessage::GameOver(GameOver {
                    winner: outcome.winner,
                    room_id,
                    win_line: outcome.win_line,
                }),
                0,
            );
            self.finish_game(room_id, outcome.players, outcome.winner).await;
            info!(room_id, winner = outcome.winner, "Game finished");
        }
    }

    async fn handle_forfeit(&mut self, seq: u16) {
        let Some((user_id, room_id)) = self.identity() else {
            return;
        };
        if room_id == 0 {
            self.reply(
                seq,
                &ServerMessage::ForfeitResp(ForfeitResp {
                    code: 400,
                    message: "not in any room".into(),
                    winner: 0,
                }),
            );
            return;
        }

        let outcome = match self.state.games.forfeit(room_id, user_id) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.reply(
                    seq,
                    &ServerMessage::ForfeitResp(ForfeitResp {
                        code: 400,
                        message: e.to_string(),
                        winner: 0,
                    }),
                );
                return;
            }
        };

        // A finished game (or a non-participant) has nothing to concede.
        if outcome.winner == 0 {
            self.reply(
                seq,
                &ServerMessage::ForfeitResp(ForfeitResp {
                    code: 400,
                    message: "game already finished".into(),
                    winner: 0,
                }),
            );
            return;
        }

        self.reply(
            seq,
            &ServerMessage::ForfeitResp(ForfeitResp {
                code: 200,
                message: "forfeit success".into(),
                winner: outcome.winner,
            }),
        );

        self.broadcast_to_room(
            room_id,
            &ServerMessage::GameOver(GameOver {
                winner: outcome.winner,
                room_id,
                win_line: Vec::new(),
            }),
            0,
        );
        self.finish_game(room_id, outcome.players, outcome.winner).await;
        info!(user_id, room_id, winner = outcome.winner, "Game forfeited");
    }

    // --- Ranking --------------------------------------------------------

    async fn handle_leaderboard(&self, seq: u16, req: LeaderboardReq) {
        match self.state.rank.get_leaderboard(req.limit, req.offset).await {
            Ok(ranks) => self.reply(
                seq,
                &ServerMessage::LeaderboardResp(LeaderboardResp {
                    code: 200,
                    message: "success".into(),
                    ranks,
                }),
            ),
            Err(e) => {
                warn!(error = %e, "Leaderboard query failed");
                self.reply(
                    seq,
                    &ServerMessage::LeaderboardResp(LeaderboardResp {
                        code: 500,
                        message: "failed to load leaderboard".into(),
                        ranks: Vec::new(),
                    }),
                );
            }
        }
    }

    async fn handle_user_stats(&self, seq: u16, req: UserStatsReq) {
        let Some((self_id, _)) = self.identity() else {
            return;
        };
        let target = if req.user_id != 0 { req.user_id } else { self_id };

        let user = match self.state.users.find_by_id(target).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.reply(
                    seq,
                    &ServerMessage::UserStatsResp(UserStatsResp {
                        code: 404,
                        message: "user not found".into(),
                        ..Default::default()
                    }),
                );
                return;
            }
            Err(e) => {
                warn!(user_id = target, error = %e, "User lookup failed");
                self.reply(
                    seq,
                    &ServerMessage::UserStatsResp(UserStatsResp {
                        code: 500,
                        message: "failed to load user".into(),
                        ..Default::default()
                    }),
                );
                return;
            }
        };

        let rank = match self.state.rank.get_user_rank(target).await {
            Ok(rank) => rank,
            Err(e) => {
                warn!(user_id = target, error = %e, "Rank query failed");
                0
            }
        };

        self.reply(
            seq,
            &ServerMessage::UserStatsResp(UserStatsResp {
                code: 200,
                message: "success".into(),
                user_id: user.id,
                username: user.username.clone(),
                score: user.score,
                win_count: user.win_count,
                lose_count: user.lose_count,
                win_rate: crate::application::win_rate(user.win_count, user.lose_count),
                rank,
            }),
        );
    }

    // --- Game end & teardown --------------------------------------------

    /// Concede a live game on behalf of `user_id` (voluntary leave or
    /// disconnect). No-op when the room has no unfinished game.
    async fn forfeit_live_game(&self, room_id: i64, user_id: i64) {
        if !self.state.games.is_active(room_id) {
            return;
        }
        let Ok(outcome) = self.state.games.forfeit(room_id, user_id) else {
            return;
        };
        if outcome.winner == 0 {
            return;
        }

        self.broadcast_to_room(
            room_id,
            &ServerMessage::GameOver(GameOver {
                winner: outcome.winner,
                room_id,
                win_line: Vec::new(),
            }),
            0,
        );
        self.finish_game(room_id, outcome.players, outcome.winner).await;
        info!(user_id, room_id, winner = outcome.winner, "Game forfeited");
    }

    /// Common tail of every game: mark the room Finished, drop the
    /// engine, settle scores, stamp the audit record. Persistence here is
    /// best-effort; the result is already final in memory and broadcast.
    async fn finish_game(&self, room_id: i64, players: [i64; 2], winner: i64) {
        let board_json = self
            .state
            .games
            .board(room_id)
            .and_then(|board| serde_json::to_string(&board).ok());

        if let Err(e) = self.state.rooms.set_status(room_id, RoomStatus::Finished) {
            debug!(room_id, error = %e, "Room vanished before finish");
        }
        self.state.games.end_game(room_id);

        if winner != 0 {
            self.update_scores(players, winner).await;
        }

        if let Some(json) = board_json {
            if let Err(e) = self
                .state
                .game_records
                .finish_by_room(room_id, winner, &json)
                .await
            {
                warn!(room_id, error = %e, "Failed to record game result");
            }
        }
    }

    /// Winner +25/+1W, loser -20/+1L; two independent best-effort writes.
    async fn update_scores(&self, players: [i64; 2], winner: i64) {
        let Some(&loser) = players.iter().find(|&&p| p != winner) else {
            return;
        };

        if let Err(e) = self
            .state
            .users
            .adjust_score(winner, WIN_SCORE_DELTA, true)
            .await
        {
            warn!(user_id = winner, error = %e, "Failed to persist winner score");
        }
        if let Err(e) = self
            .state
            .users
            .adjust_score(loser, LOSE_SCORE_DELTA, false)
            .await
        {
            warn!(user_id = loser, error = %e, "Failed to persist loser score");
        }
        info!(winner, loser, "Scores updated");
    }

    /// Runs exactly once, when the read loop ends: unregister, clear
    /// presence, and forfeit whatever game was in flight.
    async fn teardown(&mut self) {
        let Some(sess) = self.session.take() else {
            return;
        };

        self.state.hub.remove(sess.user_id, &sess.handle);

        if let Err(e) = self.state.sessions.set_user_offline(sess.user_id).await {
            warn!(user_id = sess.user_id, error = %e, "Failed to clear presence");
        }

        if sess.room_id != 0 {
            self.forfeit_live_game(sess.room_id, sess.user_id).await;

            self.broadcast_to_room(
                sess.room_id,
                &ServerMessage::PlayerLeave(PlayerLeave {
                    room_id: sess.room_id,
                    user_id: sess.user_id,
                    reason: "player disconnected".into(),
                }),
                0,
            );

            if let Err(e) = self.state.rooms.leave_room(sess.room_id, sess.user_id) {
                debug!(user_id = sess.user_id, room_id = sess.room_id, error = %e, "Leave on disconnect");
            }
        }

        info!(
            user_id = sess.user_id,
            peer = %self.peer,
            idle_ms = sess.last_active.elapsed().as_millis() as u64,
            "User disconnected"
        );
    }
}
