//! End-to-end game flows through the real connection handler, speaking
//! the binary protocol over loopback pipes.

mod common;

use common::{draw_sequence, test_env, unique_username, TestClient, TestEnv};
use gomoku_server::domain::SessionStore;
use gomoku_server::protocol::msg_type;
use serde_json::json;

/// Register+login two players, create a room with the first, join with
/// the second, and consume the GameStart handshake on both sides.
async fn start_two_player_game(
    env: &TestEnv,
) -> (TestClient, TestClient, i64, i64, i64) {
    let mut alice = TestClient::connect(env).await;
    let mut bob = TestClient::connect(env).await;

    let (alice_id, _) = alice.register_and_login("alice", "secret1").await;
    let (bob_id, _) = bob.register_and_login("bob", "secret1").await;

    let room_id = alice.create_room("alice's table").await;

    let join = bob.join_room(room_id).await;
    assert_eq!(join["code"], 200);
    assert_eq!(join["room_id"].as_i64().unwrap(), room_id);

    // The creator sees the join, then both see the start.
    let player_join = alice.recv_type(msg_type::PLAYER_JOIN).await;
    assert_eq!(player_join["user_id"].as_i64().unwrap(), bob_id);
    assert_eq!(player_join["username"], "bob");

    let start_a = alice.recv_type(msg_type::GAME_START).await;
    let start_b = bob.recv_type(msg_type::GAME_START).await;
    assert_eq!(start_a["first_player"].as_i64().unwrap(), alice_id);
    assert_eq!(start_b["first_player"].as_i64().unwrap(), alice_id);
    assert_eq!(start_b["players"], json!([alice_id, bob_id]));

    (alice, bob, alice_id, bob_id, room_id)
}

/// One legal move: mover gets MoveResp then BoardUpdate; the opponent's
/// first notification is the BoardUpdate.
async fn play_move(
    mover: &mut TestClient,
    watcher: &mut TestClient,
    room_id: i64,
    x: i32,
    y: i32,
) {
    let resp = mover.send_move(room_id, x, y).await;
    assert_eq!(resp["code"], 200, "move ({x},{y}) rejected: {resp}");
    assert_eq!(resp["x"].as_i64().unwrap(), x as i64);
    assert_eq!(resp["y"].as_i64().unwrap(), y as i64);

    let update = mover.recv_type(msg_type::BOARD_UPDATE).await;
    assert_eq!(update["last_x"].as_i64().unwrap(), x as i64);
    assert_eq!(update["last_y"].as_i64().unwrap(), y as i64);
    watcher.recv_type(msg_type::BOARD_UPDATE).await;
}

// --- S1: happy path win ------------------------------------------------

#[tokio::test]
async fn happy_path_win_updates_scores_and_broadcasts_win_line() {
    let env = test_env();
    let (mut alice, mut bob, alice_id, bob_id, room_id) = start_two_player_game(&env).await;

    let opening = [(7, 7), (8, 7), (7, 8), (8, 8), (7, 9), (8, 9), (7, 10), (8, 10)];
    for (i, &(x, y)) in opening.iter().enumerate() {
        if i % 2 == 0 {
            play_move(&mut alice, &mut bob, room_id, x, y).await;
        } else {
            play_move(&mut bob, &mut alice, room_id, x, y).await;
        }
    }

    // Alice's fifth stone completes x=7, y=7..11.
    let resp = alice.send_move(room_id, 7, 11).await;
    assert_eq!(resp["code"], 200);
    alice.recv_type(msg_type::BOARD_UPDATE).await;
    let over_a = alice.recv_type(msg_type::GAME_OVER).await;
    bob.recv_type(msg_type::BOARD_UPDATE).await;
    let over_b = bob.recv_type(msg_type::GAME_OVER).await;

    assert_eq!(over_a["winner"].as_i64().unwrap(), alice_id);
    assert_eq!(over_b["winner"].as_i64().unwrap(), alice_id);

    let mut line: Vec<i64> = over_a["win_line"]
        .as_array()
        .expect("win_line present")
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect();
    line.sort_unstable();
    assert_eq!(line, vec![112, 113, 114, 115, 116]);

    // A ping round-trip guarantees the mover's handler finished settling.
    alice.ping().await;

    let alice_row = env.users.get(alice_id).unwrap();
    let bob_row = env.users.get(bob_id).unwrap();
    assert_eq!(alice_row.score, 1025);
    assert_eq!(alice_row.win_count, 1);
    assert_eq!(alice_row.lose_count, 0);
    assert_eq!(bob_row.score, 980);
    assert_eq!(bob_row.win_count, 0);
    assert_eq!(bob_row.lose_count, 1);

    // The audit record carries the result.
    let records = env.records.all();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].winner, Some(alice_id));
}

// --- S2: out-of-turn move ----------------------------------------------

#[tokio::test]
async fn out_of_turn_move_is_rejected_and_board_unchanged() {
    let env = test_env();
    let (mut alice, mut bob, _alice_id, _bob_id, room_id) = start_two_player_game(&env).await;

    play_move(&mut alice, &mut bob, room_id, 7, 7).await;
    play_move(&mut bob, &mut alice, room_id, 8, 7).await;

    // Bob again, before alice moved.
    let resp = bob.send_move(room_id, 8, 8).await;
    assert_eq!(resp["code"], 400);
    assert_eq!(resp["message"], "not your turn");

    // No broadcast happened and the cell is still free for alice.
    play_move(&mut alice, &mut bob, room_id, 8, 8).await;
}

// --- S3: occupied cell --------------------------------------------------

#[tokio::test]
async fn occupied_cell_is_rejected() {
    let env = test_env();
    let (mut alice, mut bob, _alice_id, _bob_id, room_id) = start_two_player_game(&env).await;

    play_move(&mut alice, &mut bob, room_id, 7, 7).await;

    let resp = bob.send_move(room_id, 7, 7).await;
    assert_eq!(resp["code"], 400);
    assert_eq!(resp["message"], "cell already occupied");

    // The stone at (7,7) still belongs to alice: her next move elsewhere
    // succeeds and the board shows both.
    play_move(&mut bob, &mut alice, room_id, 8, 8).await;
    let resp = alice.send_move(room_id, 7, 8).await;
    assert_eq!(resp["code"], 200);
    let update = alice.recv_type(msg_type::BOARD_UPDATE).await;
    assert_eq!(update["board"][7][7], 1);
    assert_eq!(update["board"][8][8], 2);
    bob.recv_type(msg_type::BOARD_UPDATE).await;
}

// --- S4: disconnect = forfeit -------------------------------------------

#[tokio::test]
async fn abrupt_disconnect_forfeits_to_the_opponent() {
    let env = test_env();
    let (mut alice, mut bob, alice_id, bob_id, room_id) = start_two_player_game(&env).await;

    play_move(&mut alice, &mut bob, room_id, 7, 7).await;

    // Alice's transport drops mid-game.
    drop(alice);

    // Bob sees the forfeit result first, then the departure.
    let over = bob.recv_type(msg_type::GAME_OVER).await;
    assert_eq!(over["winner"].as_i64().unwrap(), bob_id);
    assert!(over.get("win_line").is_none());

    let leave = bob.recv_type(msg_type::PLAYER_LEAVE).await;
    assert_eq!(leave["user_id"].as_i64().unwrap(), alice_id);
    assert_eq!(leave["reason"], "player disconnected");

    // Scores settled before the PlayerLeave broadcast went out.
    let alice_row = env.users.get(alice_id).unwrap();
    let bob_row = env.users.get(bob_id).unwrap();
    assert_eq!(bob_row.score, 1025);
    assert_eq!(bob_row.win_count, 1);
    assert_eq!(alice_row.score, 980);
    assert_eq!(alice_row.lose_count, 1);

    // Presence cleared for the dropped player only.
    assert_eq!(env.sessions.online_users(), vec![bob_id]);
    assert!(!env.sessions.is_user_online(alice_id).await.unwrap());
    assert!(env.sessions.is_user_online(bob_id).await.unwrap());
}

// --- S5: draw ------------------------------------------------------------

#[tokio::test]
async fn full_board_without_five_ends_in_a_draw() {
    let env = test_env();
    let (mut alice, mut bob, alice_id, bob_id, room_id) = start_two_player_game(&env).await;

    let moves = draw_sequence();
    let last = moves.len() - 1;

    for (i, &(x, y)) in moves.iter().enumerate() {
        let (mover, watcher) = if i % 2 == 0 {
            (&mut alice, &mut bob)
        } else {
            (&mut bob, &mut alice)
        };

        let resp = mover.send_move(room_id, x, y).await;
        assert_eq!(resp["code"], 200, "move {i} at ({x},{y}): {resp}");
        mover.recv_type(msg_type::BOARD_UPDATE).await;
        watcher.recv_type(msg_type::BOARD_UPDATE).await;

        if i == last {
            let over_m = mover.recv_type(msg_type::GAME_OVER).await;
            let over_w = watcher.recv_type(msg_type::GAME_OVER).await;
            assert_eq!(over_m["winner"].as_i64().unwrap(), 0);
            assert_eq!(over_w["winner"].as_i64().unwrap(), 0);
            assert!(over_m.get("win_line").is_none());
        }
    }

    alice.ping().await;

    // Draws leave the scoreboard untouched.
    let alice_row = env.users.get(alice_id).unwrap();
    let bob_row = env.users.get(bob_id).unwrap();
    assert_eq!(alice_row.score, 1000);
    assert_eq!(bob_row.score, 1000);
    assert_eq!(alice_row.win_count + alice_row.lose_count, 0);
    assert_eq!(bob_row.win_count + bob_row.lose_count, 0);
}

// --- S6: token re-login ---------------------------------------------------

#[tokio::test]
async fn token_login_resumes_and_garbage_token_is_rejected() {
    let env = test_env();
    let mut first = TestClient::connect(&env).await;
    let (user_id, token) = first.register_and_login("alice", "secret1").await;

    let mut second = TestClient::connect(&env).await;
    let seq = second
        .send(msg_type::LOGIN, json!({ "token": token }))
        .await;
    let resp = second.recv_reply(msg_type::LOGIN_RESP, seq).await;
    assert_eq!(resp["code"], 200);
    assert_eq!(resp["user_id"].as_i64().unwrap(), user_id);
    assert_eq!(resp["token"], token.as_str());

    let mut third = TestClient::connect(&env).await;
    let seq = third
        .send(msg_type::LOGIN, json!({ "token": "garbage" }))
        .await;
    let resp = third.recv_reply(msg_type::LOGIN_RESP, seq).await;
    assert_eq!(resp["code"], 401);
    assert!(resp.get("user_id").is_none());
}

// --- Auth gate & protocol recovery ----------------------------------------

#[tokio::test]
async fn commands_before_login_get_401() {
    let env = test_env();
    let mut client = TestClient::connect(&env).await;

    let seq = client
        .send(msg_type::CREATE_ROOM, json!({ "room_name": "nope" }))
        .await;
    let err = client.recv_reply(msg_type::ERROR, seq).await;
    assert_eq!(err["code"], 401);
    assert_eq!(err["message"], "please login first");

    // Ping is allowed without a login.
    client.ping().await;
}

#[tokio::test]
async fn unknown_type_and_bad_json_keep_the_connection() {
    let env = test_env();
    let mut client = TestClient::connect(&env).await;

    let seq = client.send(4242, json!({})).await;
    let err = client.recv_reply(msg_type::ERROR, seq).await;
    assert_eq!(err["code"], 400);
    assert_eq!(err["message"], "unknown message type");

    // A schema mismatch is recoverable too.
    let seq = client
        .send(msg_type::JOIN_ROOM, json!({ "room_id": "not a number" }))
        .await;
    let err = client.recv_reply(msg_type::ERROR, seq).await;
    assert_eq!(err["code"], 400);
    assert_eq!(err["message"], "invalid payload");

    client.ping().await;
}

#[tokio::test]
async fn framing_violation_closes_the_connection() {
    let env = test_env();
    let mut client = TestClient::connect(&env).await;
    client.ping().await;

    // Len = 4 < header size: transport-fatal.
    client.send_raw(&[0, 0, 0, 4, 0x03, 0xE8, 0, 1]).await;
    assert!(client.closed().await);
}

// --- Rooms -----------------------------------------------------------------

#[tokio::test]
async fn room_list_shows_waiting_rooms_only() {
    let env = test_env();
    let mut alice = TestClient::connect(&env).await;
    let mut bob = TestClient::connect(&env).await;
    alice.register_and_login("alice", "secret1").await;
    bob.register_and_login("bob", "secret1").await;

    let room_id = alice.create_room("open table").await;

    let seq = bob.send(msg_type::ROOM_LIST, json!({})).await;
    let resp = bob.recv_reply(msg_type::ROOM_LIST_RESP, seq).await;
    assert_eq!(resp["code"], 200);
    let rooms = resp["rooms"].as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["room_id"].as_i64().unwrap(), room_id);
    assert_eq!(rooms[0]["room_name"], "open table");
    assert_eq!(rooms[0]["status"], 0);

    // Filling the room starts a game and hides it from the list.
    assert_eq!(bob.join_room(room_id).await["code"], 200);
    alice.recv_type(msg_type::PLAYER_JOIN).await;
    alice.recv_type(msg_type::GAME_START).await;
    bob.recv_type(msg_type::GAME_START).await;

    let seq = bob.send(msg_type::ROOM_LIST, json!({})).await;
    let resp = bob.recv_reply(msg_type::ROOM_LIST_RESP, seq).await;
    assert!(resp.get("rooms").is_none());
}

#[tokio::test]
async fn join_errors_room_full_missing_and_double_join() {
    let env = test_env();
    let mut alice = TestClient::connect(&env).await;
    let mut bob = TestClient::connect(&env).await;
    let mut carol = TestClient::connect(&env).await;
    alice.register_and_login("alice", "secret1").await;
    bob.register_and_login("bob", "secret1").await;
    carol.register_and_login("carol", "secret1").await;

    let missing = carol.join_room(999).await;
    assert_eq!(missing["code"], 404);
    assert_eq!(missing["message"], "room not found");

    let room_id = alice.create_room("table").await;
    assert_eq!(bob.join_room(room_id).await["code"], 200);
    alice.recv_type(msg_type::PLAYER_JOIN).await;
    alice.recv_type(msg_type::GAME_START).await;
    bob.recv_type(msg_type::GAME_START).await;

    let full = carol.join_room(room_id).await;
    assert_eq!(full["code"], 400);
    assert_eq!(full["message"], "room is full");

    // The creator is already inside a room.
    let again = alice.join_room(room_id).await;
    assert_eq!(again["code"], 400);
    assert_eq!(again["message"], "already in a room, please leave first");
}

#[tokio::test]
async fn leaving_mid_game_concedes_it() {
    let env = test_env();
    let (mut alice, mut bob, alice_id, bob_id, room_id) = start_two_player_game(&env).await;

    play_move(&mut alice, &mut bob, room_id, 7, 7).await;

    let seq = bob
        .send(msg_type::LEAVE_ROOM, json!({ "room_id": room_id }))
        .await;

    // Bob's own connection sees the fallout in order: the conceded game,
    // the departure broadcast, then his response.
    let over = bob.recv_type(msg_type::GAME_OVER).await;
    assert_eq!(over["winner"].as_i64().unwrap(), alice_id);
    let leave = bob.recv_type(msg_type::PLAYER_LEAVE).await;
    assert_eq!(leave["reason"], "player left");
    let resp = bob.recv_reply(msg_type::LEAVE_ROOM_RESP, seq).await;
    assert_eq!(resp["code"], 200);

    let over = alice.recv_type(msg_type::GAME_OVER).await;
    assert_eq!(over["winner"].as_i64().unwrap(), alice_id);
    let leave = alice.recv_type(msg_type::PLAYER_LEAVE).await;
    assert_eq!(leave["user_id"].as_i64().unwrap(), bob_id);

    alice.ping().await;
    assert_eq!(env.users.get(alice_id).unwrap().score, 1025);
    assert_eq!(env.users.get(bob_id).unwrap().score, 980);
}

#[tokio::test]
async fn forfeit_request_ends_the_game_once() {
    let env = test_env();
    let (mut alice, mut bob, alice_id, _bob_id, room_id) = start_two_player_game(&env).await;

    play_move(&mut alice, &mut bob, room_id, 7, 7).await;

    let seq = bob
        .send(msg_type::FORFEIT_REQ, json!({ "room_id": room_id }))
        .await;
    let resp = bob.recv_reply(msg_type::FORFEIT_RESP, seq).await;
    assert_eq!(resp["code"], 200);
    assert_eq!(resp["winner"].as_i64().unwrap(), alice_id);

    let over_b = bob.recv_type(msg_type::GAME_OVER).await;
    let over_a = alice.recv_type(msg_type::GAME_OVER).await;
    assert_eq!(over_b["winner"].as_i64().unwrap(), alice_id);
    assert_eq!(over_a["winner"].as_i64().unwrap(), alice_id);

    // A second forfeit finds no live game.
    let seq = bob
        .send(msg_type::FORFEIT_REQ, json!({ "room_id": room_id }))
        .await;
    let resp = bob.recv_reply(msg_type::FORFEIT_RESP, seq).await;
    assert_eq!(resp["code"], 400);

    bob.ping().await;
    assert_eq!(env.users.get(alice_id).unwrap().score, 1025);
    assert_eq!(env.users.get(alice_id).unwrap().win_count, 1);
}

// --- Registration ------------------------------------------------------------

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let env = test_env();
    let mut first = TestClient::connect(&env).await;
    let mut second = TestClient::connect(&env).await;

    let name = unique_username();
    let resp = first.register(&name, "secret1").await;
    assert_eq!(resp["code"], 200);

    let resp = second.register(&name, "secret1").await;
    assert_eq!(resp["code"], 400);
    assert_eq!(resp["message"], "user already exists");
}

#[tokio::test]
async fn concurrent_registration_has_exactly_one_winner() {
    let env = test_env();
    let mut first = TestClient::connect(&env).await;
    let mut second = TestClient::connect(&env).await;

    let name = unique_username();
    let name_a = name.clone();
    let name_b = name.clone();

    let a = tokio::spawn(async move {
        let resp = first.register(&name_a, "secret1").await;
        resp["code"].as_i64().unwrap()
    });
    let b = tokio::spawn(async move {
        let resp = second.register(&name_b, "secret1").await;
        resp["code"].as_i64().unwrap()
    });

    let mut codes = vec![a.await.unwrap(), b.await.unwrap()];
    codes.sort_unstable();
    assert_eq!(codes, vec![200, 400]);
}

#[tokio::test]
async fn invalid_usernames_and_passwords_are_rejected() {
    let env = test_env();
    let mut client = TestClient::connect(&env).await;

    let resp = client.register("a", "secret1").await;
    assert_eq!(resp["code"], 400);

    let resp = client.register("al ice", "secret1").await;
    assert_eq!(resp["code"], 400);

    let resp = client.register("alice", "short").await;
    assert_eq!(resp["code"], 400);

    let resp = client.register("alice", "secret1").await;
    assert_eq!(resp["code"], 200);
}

// --- Scoreboard over the wire -------------------------------------------------

#[tokio::test]
async fn leaderboard_and_user_stats_queries() {
    let env = test_env();
    let (mut alice, mut bob, alice_id, bob_id, room_id) = start_two_player_game(&env).await;

    // Quick decisive game: alice wins by forfeit.
    let seq = bob
        .send(msg_type::FORFEIT_REQ, json!({ "room_id": room_id }))
        .await;
    assert_eq!(bob.recv_reply(msg_type::FORFEIT_RESP, seq).await["code"], 200);
    bob.recv_type(msg_type::GAME_OVER).await;
    alice.recv_type(msg_type::GAME_OVER).await;
    alice.ping().await;

    let seq = alice
        .send(msg_type::LEADERBOARD_REQ, json!({ "limit": 10, "offset": 0 }))
        .await;
    let resp = alice.recv_reply(msg_type::LEADERBOARD_RESP, seq).await;
    assert_eq!(resp["code"], 200);
    let ranks = resp["ranks"].as_array().unwrap();
    assert_eq!(ranks.len(), 2);
    assert_eq!(ranks[0]["user_id"].as_i64().unwrap(), alice_id);
    assert_eq!(ranks[0]["rank"], 1);
    assert_eq!(ranks[0]["score"], 1025);
    assert_eq!(ranks[0]["win_rate"], "100.0%");
    assert_eq!(ranks[1]["user_id"].as_i64().unwrap(), bob_id);
    assert_eq!(ranks[1]["rank"], 2);
    assert_eq!(ranks[1]["win_rate"], "0.0%");

    // Own stats when user_id is omitted.
    let seq = alice.send(msg_type::USER_STATS_REQ, json!({})).await;
    let stats = alice.recv_reply(msg_type::USER_STATS_RESP, seq).await;
    assert_eq!(stats["code"], 200);
    assert_eq!(stats["user_id"].as_i64().unwrap(), alice_id);
    assert_eq!(stats["score"], 1025);
    assert_eq!(stats["win_count"], 1);
    assert_eq!(stats["rank"], 1);

    // Someone else's stats by id.
    let seq = alice
        .send(msg_type::USER_STATS_REQ, json!({ "user_id": bob_id }))
        .await;
    let stats = alice.recv_reply(msg_type::USER_STATS_RESP, seq).await;
    assert_eq!(stats["username"], "bob");
    assert_eq!(stats["score"], 980);
    assert_eq!(stats["rank"], 2);

    // Unknown target.
    let seq = alice
        .send(msg_type::USER_STATS_REQ, json!({ "user_id": 424242 }))
        .await;
    let stats = alice.recv_reply(msg_type::USER_STATS_RESP, seq).await;
    assert_eq!(stats["code"], 404);
    assert_eq!(stats["message"], "user not found");
}
