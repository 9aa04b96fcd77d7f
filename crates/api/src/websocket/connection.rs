//! WebSocket connection handle

use tokio::sync::mpsc;
use uuid::Uuid;

use trailtalk_shared::ServerEvent;

/// One live WebSocket connection.
///
/// Whether the connection belongs to a visitor or an agent is not decided
/// here: visitors stay anonymous, agents identify themselves with an
/// `agent:join` event and are tracked by the agent registry.
#[derive(Debug)]
pub struct Connection {
    /// Unique ID for this connection (not the support-session ID).
    pub connection_id: Uuid,

    /// Channel to the task draining events onto the socket.
    sender: mpsc::UnboundedSender<ServerEvent>,
}

impl Connection {
    pub fn new(sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            sender,
        }
    }

    /// Queue an event for this connection.
    ///
    /// Returns Err if the connection's egress task has already shut down.
    #[allow(clippy::result_large_err)] // SendError carries the undelivered event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }
}
