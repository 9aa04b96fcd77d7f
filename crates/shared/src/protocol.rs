//! Wire protocol for the real-time support channel
//!
//! Events are internally tagged JSON objects: `{ "type": "<event name>", ... }`
//! with camelCase payload fields. The same definitions are used by the server
//! and by the visitor-side widget, so both directions derive `Serialize` and
//! `Deserialize`.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::{SenderRole, SupportMessage, SupportSession};

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from a connected client (visitor widget or agent console)
/// to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// A staff agent identifies this connection as an agent console.
    #[serde(rename = "agent:join")]
    AgentJoin {
        agent_id: String,
        name: String,
        email: String,
    },

    /// A visitor requests a new support session.
    #[serde(rename = "support:start")]
    StartSession {
        #[serde(default)]
        user_id: Option<String>,
        user_name: String,
        user_email: String,
    },

    /// An agent claims a waiting session. First claimer wins.
    #[serde(rename = "agent:accept-session")]
    AcceptSession { session_id: Uuid },

    /// Either party sends a chat message.
    #[serde(rename = "message:send")]
    SendMessage {
        session_id: Uuid,
        message: String,
        sender_type: SenderRole,
        sender_name: String,
    },

    /// Either party started typing.
    #[serde(rename = "typing:start")]
    TypingStart {
        session_id: Uuid,
        #[serde(default)]
        name: Option<String>,
    },

    /// Either party stopped typing.
    #[serde(rename = "typing:stop")]
    TypingStop {
        session_id: Uuid,
        #[serde(default)]
        name: Option<String>,
    },

    /// Either party closes the session.
    #[serde(rename = "session:close")]
    CloseSession { session_id: Uuid },
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from the server to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Connection acknowledged.
    #[serde(rename = "connected")]
    Connected { connection_id: Uuid },

    /// The visitor's session was created and is queued for an agent.
    #[serde(rename = "session:created")]
    SessionCreated { session_id: Uuid },

    /// A new waiting session, broadcast to every connected agent. Also
    /// re-broadcast when an agent disconnect reverts a session to waiting.
    #[serde(rename = "new-support-request")]
    NewSupportRequest {
        #[serde(flatten)]
        session: SupportSession,
    },

    /// Sent to the visitor when an agent accepts their session.
    #[serde(rename = "agent:joined")]
    AgentJoined {
        agent_id: String,
        agent_name: String,
    },

    /// Session status change fan-out so agent queue views stay current.
    #[serde(rename = "session:status-changed")]
    SessionStatusChanged {
        session_id: Uuid,
        status: crate::types::SessionStatus,
        #[serde(default)]
        agent_name: Option<String>,
    },

    /// Sent to an agent whose accept lost the race for a waiting session.
    #[serde(rename = "session:already-claimed")]
    SessionAlreadyClaimed { session_id: Uuid },

    /// A persisted message, relayed to every participant of the session.
    #[serde(rename = "message:received")]
    MessageReceived {
        #[serde(flatten)]
        message: SupportMessage,
    },

    /// Transient typing indicator, relayed to the other party. Never persisted.
    #[serde(rename = "user:typing")]
    UserTyping {
        #[serde(default)]
        name: Option<String>,
        is_typing: bool,
    },

    /// The session was closed by either party.
    #[serde(rename = "session:closed")]
    SessionClosed {
        session_id: Uuid,
        #[serde(with = "time::serde::rfc3339")]
        closed_at: OffsetDateTime,
    },

    /// Sent to the visitor when their assigned agent's connection drops.
    #[serde(rename = "agent:disconnected")]
    AgentDisconnected { message: String },

    /// Agent presence fan-out to other agent consoles.
    #[serde(rename = "agent-status")]
    AgentStatus {
        status: AgentPresence,
        agent_id: String,
        agent_name: String,
    },

    /// The current waiting queue, sent to an agent console on join.
    #[serde(rename = "waiting-sessions")]
    WaitingSessions { sessions: Vec<SupportSession> },

    /// Full transcript of a session, sent to an agent reconstructing one
    /// (e.g. on accept).
    #[serde(rename = "session:history")]
    SessionHistory {
        session_id: Uuid,
        messages: Vec<SupportMessage>,
    },

    /// Error surfaced to the originating connection only.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Agent presence as seen by other agent consoles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentPresence {
    Online,
    Offline,
}
