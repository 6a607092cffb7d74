//! Message Registry
//!
//! The closed set of 16-bit message type codes and their JSON payload
//! schemas, expressed as two exhaustive sum types: `ClientMessage` for
//! everything a client may send and `ServerMessage` for everything the
//! server emits. Decoding pattern-matches on the type code; encoding
//! derives the code from the variant.

use serde::{Deserialize, Serialize};

use super::packet::{Frame, ProtocolError};

/// Wire type codes.
pub mod msg_type {
    pub const PING: u16 = 1000;
    pub const PONG: u16 = 1001;
    pub const LOGIN: u16 = 2001;
    pub const LOGIN_RESP: u16 = 2002;
    pub const REGISTER: u16 = 2003;
    pub const REGISTER_RESP: u16 = 2004;
    pub const CREATE_ROOM: u16 = 3001;
    pub const JOIN_ROOM: u16 = 3002;
    pub const LEAVE_ROOM: u16 = 3003;
    pub const ROOM_LIST: u16 = 3004;
    pub const CREATE_ROOM_RESP: u16 = 3011;
    pub const JOIN_ROOM_RESP: u16 = 3012;
    pub const LEAVE_ROOM_RESP: u16 = 3013;
    pub const ROOM_LIST_RESP: u16 = 3014;
    pub const PLAYER_JOIN: u16 = 3015;
    pub const PLAYER_LEAVE: u16 = 3016;
    pub const MOVE: u16 = 4001;
    pub const MOVE_RESP: u16 = 4002;
    pub const GAME_OVER: u16 = 4003;
    pub const GAME_START: u16 = 4004;
    pub const BOARD_UPDATE: u16 = 4005;
    pub const FORFEIT_REQ: u16 = 4006;
    pub const FORFEIT_RESP: u16 = 4007;
    pub const LEADERBOARD_REQ: u16 = 5001;
    pub const LEADERBOARD_RESP: u16 = 5002;
    pub const USER_STATS_REQ: u16 = 5003;
    pub const USER_STATS_RESP: u16 = 5004;
    pub const ERROR: u16 = 9999;
}

// --- Request payloads -------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginReq {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterReq {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomReq {
    #[serde(default)]
    pub room_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomReq {
    pub room_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRoomReq {
    #[serde(default)]
    pub room_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveReq {
    pub room_id: i64,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForfeitReq {
    #[serde(default)]
    pub room_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderboardReq {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStatsReq {
    #[serde(default)]
    pub user_id: i64,
}

// --- Response / notification payloads ---------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResp {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub user_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterResp {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub user_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRoomResp {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub room_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinRoomResp {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub room_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaveRoomResp {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_id: i64,
    pub room_name: String,
    pub players: Vec<i64>,
    pub creator_id: i64,
    pub status: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomListResp {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rooms: Vec<RoomInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerJoin {
    pub room_id: i64,
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerLeave {
    pub room_id: i64,
    pub user_id: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoveResp {
    pub code: i32,
    pub message: String,
    pub x: i32,
    pub y: i32,
    pub player: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameOver {
    pub winner: i64,
    pub room_id: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub win_line: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStart {
    pub room_id: i64,
    pub players: Vec<i64>,
    pub first_player: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardUpdate {
    pub room_id: i64,
    pub board: Vec<Vec<u8>>,
    pub last_x: i32,
    pub last_y: i32,
    pub last_player: i64,
    pub current_player: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForfeitResp {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub winner: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankEntry {
    pub user_id: i64,
    pub username: String,
    pub score: i32,
    pub win_count: i32,
    pub lose_count: i32,
    pub win_rate: String,
    pub rank: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaderboardResp {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranks: Vec<RankEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStatsResp {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub score: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub win_count: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub lose_count: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub win_rate: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub rank: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResp {
    pub code: i32,
    pub message: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

// --- Sum types ---------------------------------------------------------------

/// Every message a client may send.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    Ping,
    Login(LoginReq),
    Register(RegisterReq),
    CreateRoom(CreateRoomReq),
    JoinRoom(JoinRoomReq),
    LeaveRoom(LeaveRoomReq),
    RoomList,
    Move(MoveReq),
    Forfeit(ForfeitReq),
    Leaderboard(LeaderboardReq),
    UserStats(UserStatsReq),
}

impl ClientMessage {
    /// Decode a payload against the schema registered for `msg_type`.
    ///
    /// Unregistered codes fail with `UnknownMsgType`; a payload that does
    /// not fit the schema fails with `InvalidPayload`. An empty body is
    /// only legal for the payload-less kinds (Ping, RoomList).
    pub fn decode(msg_type: u16, payload: &[u8]) -> Result<Self, ProtocolError> {
        use self::msg_type as t;

        match msg_type {
            t::PING => Ok(ClientMessage::Ping),
            t::ROOM_LIST => Ok(ClientMessage::RoomList),
            t::LOGIN => Ok(ClientMessage::Login(parse(payload)?)),
            t::REGISTER => Ok(ClientMessage::Register(parse(payload)?)),
            t::CREATE_ROOM => Ok(ClientMessage::CreateRoom(parse(payload)?)),
            t::JOIN_ROOM => Ok(ClientMessage::JoinRoom(parse(payload)?)),
            t::LEAVE_ROOM => Ok(ClientMessage::LeaveRoom(parse(payload)?)),
            t::MOVE => Ok(ClientMessage::Move(parse(payload)?)),
            t::FORFEIT_REQ => Ok(ClientMessage::Forfeit(parse(payload)?)),
            t::LEADERBOARD_REQ => Ok(ClientMessage::Leaderboard(parse(payload)?)),
            t::USER_STATS_REQ => Ok(ClientMessage::UserStats(parse(payload)?)),
            other => Err(ProtocolError::UnknownMsgType(other)),
        }
    }

    /// True for the messages an unauthenticated connection may send.
    pub fn allowed_before_login(&self) -> bool {
        matches!(
            self,
            ClientMessage::Ping | ClientMessage::Login(_) | ClientMessage::Register(_)
        )
    }
}

fn parse<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> Result<T, ProtocolError> {
    // An empty body fails here too: serde_json reports it as unexpected EOF.
    serde_json::from_slice(payload).map_err(ProtocolError::InvalidPayload)
}

/// Every message the server emits.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    Pong,
    LoginResp(LoginResp),
    RegisterResp(RegisterResp),
    CreateRoomResp(CreateRoomResp),
    JoinRoomResp(JoinRoomResp),
    LeaveRoomResp(LeaveRoomResp),
    RoomListResp(RoomListResp),
    PlayerJoin(PlayerJoin),
    PlayerLeave(PlayerLeave),
    MoveResp(MoveResp),
    GameStart(GameStart),
    BoardUpdate(BoardUpdate),
    GameOver(GameOver),
    ForfeitResp(ForfeitResp),
    LeaderboardResp(LeaderboardResp),
    UserStatsResp(UserStatsResp),
    Error(ErrorResp),
}

impl ServerMessage {
    pub fn msg_type(&self) -> u16 {
        use self::msg_type as t;

        match self {
            ServerMessage::Pong => t::PONG,
            ServerMessage::LoginResp(_) => t::LOGIN_RESP,
            ServerMessage::RegisterResp(_) => t::REGISTER_RESP,
            ServerMessage::CreateRoomResp(_) => t::CREATE_ROOM_RESP,
            ServerMessage::JoinRoomResp(_) => t::JOIN_ROOM_RESP,
            ServerMessage::LeaveRoomResp(_) => t::LEAVE_ROOM_RESP,
            ServerMessage::RoomListResp(_) => t::ROOM_LIST_RESP,
            ServerMessage::PlayerJoin(_) => t::PLAYER_JOIN,
            ServerMessage::PlayerLeave(_) => t::PLAYER_LEAVE,
            ServerMessage::MoveResp(_) => t::MOVE_RESP,
            ServerMessage::GameStart(_) => t::GAME_START,
            ServerMessage::BoardUpdate(_) => t::BOARD_UPDATE,
            ServerMessage::GameOver(_) => t::GAME_OVER,
            ServerMessage::ForfeitResp(_) => t::FORFEIT_RESP,
            ServerMessage::LeaderboardResp(_) => t::LEADERBOARD_RESP,
            ServerMessage::UserStatsResp(_) => t::USER_STATS_RESP,
            ServerMessage::Error(_) => t::ERROR,
        }
    }

    /// Serialize the payload as JSON bytes.
    pub fn encode_payload(&self) -> Result<Vec<u8>, ProtocolError> {
        let bytes = match self {
            ServerMessage::Pong => serde_json::to_vec(&serde_json::json!({}))?,
            ServerMessage::LoginResp(p) => serde_json::to_vec(p)?,
            ServerMessage::RegisterResp(p) => serde_json::to_vec(p)?,
            ServerMessage::CreateRoomResp(p) => serde_json::to_vec(p)?,
            ServerMessage::JoinRoomResp(p) => serde_json::to_vec(p)?,
            ServerMessage::LeaveRoomResp(p) => serde_json::to_vec(p)?,
            ServerMessage::RoomListResp(p) => serde_json::to_vec(p)?,
            ServerMessage::PlayerJoin(p) => serde_json::to_vec(p)?,
            ServerMessage::PlayerLeave(p) => serde_json::to_vec(p)?,
            ServerMessage::MoveResp(p) => serde_json::to_vec(p)?,
            ServerMessage::GameStart(p) => serde_json::to_vec(p)?,
            ServerMessage::BoardUpdate(p) => serde_json::to_vec(p)?,
            ServerMessage::GameOver(p) => serde_json::to_vec(p)?,
            ServerMessage::ForfeitResp(p) => serde_json::to_vec(p)?,
            ServerMessage::LeaderboardResp(p) => serde_json::to_vec(p)?,
            ServerMessage::UserStatsResp(p) => serde_json::to_vec(p)?,
            ServerMessage::Error(p) => serde_json::to_vec(p)?,
        };
        Ok(bytes)
    }

    /// Wrap the serialized payload in a frame carrying `seq`.
    pub fn to_frame(&self, seq: u16) -> Result<Frame, ProtocolError> {
        let payload = self.encode_payload()?;
        if payload.len() > super::packet::MAX_BODY_LEN {
            return Err(ProtocolError::PacketTooLarge);
        }
        Ok(Frame::new(self.msg_type(), seq, payload))
    }

    /// Shorthand for the generic error response.
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorResp {
            code,
            message: message.into(),
        })
    }
}
