//! Per-session rooms for relaying events to participants

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use trailtalk_shared::ServerEvent;

use super::connection::Connection;

/// Tracks which connections are joined to which support session, and fans
/// events out to them. A room normally holds the visitor and, once the
/// session is accepted, the assigned agent.
pub struct SessionRooms {
    rooms: RwLock<HashMap<Uuid, Vec<Arc<Connection>>>>,
}

impl SessionRooms {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection to a session room.
    pub async fn join(&self, session_id: Uuid, conn: Arc<Connection>) {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(session_id).or_default();
        if !room
            .iter()
            .any(|c| c.connection_id == conn.connection_id)
        {
            room.push(conn);
        }
        tracing::debug!(
            session_id = %session_id,
            room_size = room.len(),
            "connection joined session room"
        );
    }

    /// Relay an event to every participant of a session.
    ///
    /// Send failures are logged and skipped; closed connections get cleaned
    /// up when their socket task exits.
    pub async fn broadcast(&self, session_id: &Uuid, event: ServerEvent) {
        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(session_id) else {
            tracing::debug!(session_id = %session_id, "no participants for session");
            return;
        };

        for conn in room {
            if conn.send(event.clone()).is_err() {
                tracing::warn!(
                    connection_id = %conn.connection_id,
                    session_id = %session_id,
                    "failed to relay event (connection closed)"
                );
            }
        }
    }

    /// Relay an event to every participant except the sender. Used for
    /// typing indicators, which only the other party should see.
    pub async fn broadcast_except(
        &self,
        session_id: &Uuid,
        except: Uuid,
        event: ServerEvent,
    ) {
        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(session_id) else {
            return;
        };

        for conn in room.iter().filter(|c| c.connection_id != except) {
            if conn.send(event.clone()).is_err() {
                tracing::warn!(
                    connection_id = %conn.connection_id,
                    session_id = %session_id,
                    "failed to relay event (connection closed)"
                );
            }
        }
    }

    /// Drop a whole room (session closed).
    pub async fn remove(&self, session_id: &Uuid) {
        let mut rooms = self.rooms.write().await;
        rooms.remove(session_id);
    }

    /// Remove a connection from every room it joined.
    pub async fn remove_connection(&self, connection_id: &Uuid) {
        let mut rooms = self.rooms.write().await;
        for room in rooms.values_mut() {
            room.retain(|c| c.connection_id != *connection_id);
        }
        rooms.retain(|_, room| !room.is_empty());
    }

    pub async fn room_size(&self, session_id: &Uuid) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(session_id).map(|r| r.len()).unwrap_or(0)
    }

    pub async fn room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }
}

impl Default for SessionRooms {
    fn default() -> Self {
        Self::new()
    }
}
