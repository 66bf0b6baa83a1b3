//! Room-scoped broadcast hub.
//!
//! Maps connected WebSocket sessions to logical rooms and fans events
//! out to the room's current subscriber set only. Scoping by room
//! (`city:<name>`, `order:<id>`) bounds per-event fan-out instead of
//! waking every connected client.
//!
//! There is no replay: a session joining after a broadcast does not see
//! it. Membership is cleaned up synchronously on disconnect via
//! [`Hub::unregister`], which runs `leave_all` exactly once per
//! connection lifecycle.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tokio::sync::mpsc;

use errors::{EntregaError, EntregaResult};

/// WebSocket session id (UUID string)
pub type SessionId = String;

/// Message handed to a session's send task
#[derive(Debug, Clone)]
pub enum RoomMessage {
    Text(String),
    Close,
}

/// Room key for a single order's subscribers
pub fn order_room(order_id: uuid::Uuid) -> String {
    format!("order:{}", order_id)
}

/// Room key for a city's subscribers
pub fn city_room(city: &str) -> String {
    format!("city:{}", city)
}

/// Validate a client-supplied room key: `<scope>:<id>` with a known
/// scope and non-empty id.
pub fn validate_room_key(key: &str) -> EntregaResult<()> {
    match key.split_once(':') {
        Some(("city" | "order", id)) if !id.is_empty() => Ok(()),
        _ => Err(EntregaError::InvalidRoomKey(key.to_string())),
    }
}

#[derive(Default)]
struct HubInner {
    /// Session id -> sender owned by the session's send task
    sessions: HashMap<SessionId, mpsc::UnboundedSender<RoomMessage>>,
    /// Room key -> subscribed session ids
    rooms: HashMap<String, HashSet<SessionId>>,
    /// Session id -> rooms it joined (for leave_all)
    memberships: HashMap<SessionId, HashSet<String>>,
}

#[derive(Default)]
pub struct Hub {
    inner: RwLock<HubInner>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connected session and its outbound sender.
    pub fn register(&self, session_id: SessionId, sender: mpsc::UnboundedSender<RoomMessage>) {
        let mut inner = self.inner.write();
        inner.memberships.entry(session_id.clone()).or_default();
        inner.sessions.insert(session_id, sender);
    }

    /// Remove a session and all of its subscriptions.
    pub fn unregister(&self, session_id: &str) {
        let mut inner = self.inner.write();
        if let Some(rooms) = inner.memberships.remove(session_id) {
            for room in rooms {
                if let Some(members) = inner.rooms.get_mut(&room) {
                    members.remove(session_id);
                    if members.is_empty() {
                        inner.rooms.remove(&room);
                    }
                }
            }
        }
        inner.sessions.remove(session_id);
    }

    /// Subscribe a session to a room.
    pub fn join(&self, session_id: &str, room: &str) -> EntregaResult<()> {
        validate_room_key(room)?;
        let mut inner = self.inner.write();
        if !inner.sessions.contains_key(session_id) {
            return Err(EntregaError::NotFound {
                resource: format!("session {}", session_id),
            });
        }
        inner
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(session_id.to_string());
        inner
            .memberships
            .entry(session_id.to_string())
            .or_default()
            .insert(room.to_string());
        Ok(())
    }

    /// Unsubscribe a session from a room. Unknown memberships are a
    /// no-op.
    pub fn leave(&self, session_id: &str, room: &str) {
        let mut inner = self.inner.write();
        if let Some(members) = inner.rooms.get_mut(room) {
            members.remove(session_id);
            if members.is_empty() {
                inner.rooms.remove(room);
            }
        }
        if let Some(rooms) = inner.memberships.get_mut(session_id) {
            rooms.remove(room);
        }
    }

    /// Drop every subscription a session holds, keeping it registered.
    pub fn leave_all(&self, session_id: &str) {
        let mut inner = self.inner.write();
        let Some(rooms) = inner.memberships.remove(session_id) else {
            return;
        };
        for room in rooms {
            if let Some(members) = inner.rooms.get_mut(&room) {
                members.remove(session_id);
                if members.is_empty() {
                    inner.rooms.remove(&room);
                }
            }
        }
        inner.memberships.insert(session_id.to_string(), HashSet::new());
    }

    /// Deliver `payload` to every session currently in `room`.
    ///
    /// Senders are unbounded so delivery never blocks the caller; a
    /// session whose receiver is gone is skipped (its disconnect
    /// cleanup will unregister it). Returns the number of sessions the
    /// event was handed to.
    pub fn broadcast(&self, room: &str, payload: &str) -> usize {
        let inner = self.inner.read();
        let Some(members) = inner.rooms.get(room) else {
            return 0;
        };
        let mut delivered = 0;
        for session_id in members {
            if let Some(sender) = inner.sessions.get(session_id) {
                if sender.send(RoomMessage::Text(payload.to_string())).is_ok() {
                    delivered += 1;
                } else {
                    tracing::debug!(session = %session_id, room, "dropping send to closed session");
                }
            }
        }
        delivered
    }

    /// Send a message to one session.
    pub fn send_to(&self, session_id: &str, message: RoomMessage) {
        let inner = self.inner.read();
        if let Some(sender) = inner.sessions.get(session_id) {
            let _ = sender.send(message);
        }
    }

    pub fn session_count(&self) -> usize {
        self.inner.read().sessions.len()
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.inner
            .read()
            .rooms
            .get(room)
            .map(HashSet::len)
            .unwrap_or(0)
    }
}
