//! Broadcast Hub
//!
//! Maps online users to their connection outboxes and fans server
//! notifications out to a room or to everyone. The hub exclusively owns
//! the map; handlers add themselves on login and remove themselves at
//! teardown, and nothing else touches it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::{Frame, ServerMessage};

/// Shared record for one authenticated connection. The sender is the
/// connection's single-writer outbox, so concurrent broadcasts can never
/// interleave frames on the wire.
pub struct ClientHandle {
    pub user_id: i64,
    pub username: String,
    pub token: String,
    pub sender: mpsc::UnboundedSender<Frame>,
}

#[derive(Default)]
pub struct Hub {
    clients: RwLock<HashMap<i64, Arc<ClientHandle>>>,
    seq: AtomicU16,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            seq: AtomicU16::new(0),
        }
    }

    /// Fresh sequence number for a server-originated frame; wraps.
    pub fn next_seq(&self) -> u16 {
        self.seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Register a connection, replacing any previous record for the user.
    pub fn insert(&self, handle: Arc<ClientHandle>) {
        let mut clients = self.clients.write().expect("hub lock poisoned");
        clients.insert(handle.user_id, handle);
    }

    /// Remove the user's record, but only when it still belongs to this
    /// connection. A stale teardown must not evict a newer login.
    pub fn remove(&self, user_id: i64, handle: &Arc<ClientHandle>) -> bool {
        let mut clients = self.clients.write().expect("hub lock poisoned");
        match clients.get(&user_id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                clients.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, user_id: i64) -> Option<Arc<ClientHandle>> {
        self.clients
            .read()
            .expect("hub lock poisoned")
            .get(&user_id)
            .cloned()
    }

    pub fn online_count(&self) -> usize {
        self.clients.read().expect("hub lock poisoned").len()
    }

    /// Unicast with a fresh server sequence. Returns false when the user
    /// has no live connection.
    pub fn send_to_user(&self, user_id: i64, msg: &ServerMessage) -> bool {
        let Some(handle) = self.get(user_id) else {
            return false;
        };
        let Some(payload) = self.encode_or_log(msg) else {
            return false;
        };
        self.dispatch(&handle, msg.msg_type(), &payload)
    }

    /// Fan a message out to a player snapshot (captured by the caller
    /// under the room lock, released before we take the hub lock).
    /// Players without a live record are silently skipped.
    pub fn broadcast_to_players(&self, players: &[i64], msg: &ServerMessage, exclude: i64) {
        let Some(payload) = self.encode_or_log(msg) else {
            return;
        };

        let clients = self.clients.read().expect("hub lock poisoned");
        for &player in players {
            if player == exclude {
                continue;
            }
            if let Some(handle) = clients.get(&player) {
                self.dispatch(handle, msg.msg_type(), &payload);
            }
        }
    }

    /// Fan a message out to every online user.
    pub fn broadcast_to_all(&self, msg: &ServerMessage, exclude: i64) {
        let Some(payload) = self.encode_or_log(msg) else {
            return;
        };

        let clients = self.clients.read().expect("hub lock poisoned");
        for (&user_id, handle) in clients.iter() {
            if user_id == exclude {
                continue;
            }
            self.dispatch(handle, msg.msg_type(), &payload);
        }
    }

    /// Serialize once per broadcast; per-target frames only differ in the
    /// sequence number.
    fn encode_or_log(&self, msg: &ServerMessage) -> Option<Vec<u8>> {
        match msg.encode_payload() {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!(error = %e, msg_type = msg.msg_type(), "Failed to encode broadcast");
                None
            }
        }
    }

    fn dispatch(&self, handle: &ClientHandle, msg_type: u16, payload: &[u8]) -> bool {
        let frame = Frame::new(msg_type, self.next_seq(), payload.to_vec());
        if handle.sender.send(frame).is_err() {
            // The connection is going away; its read loop will notice and
            // run teardown.
            debug!(user_id = handle.user_id, "Dropped frame for closed connection");
            return false;
        }
        true
    }
}
