//! Support-chat domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Maximum accepted message body length, in characters.
pub const MAX_MESSAGE_LEN: usize = 2000;

/// Lifecycle status of a support session.
///
/// Legal transitions: `waiting -> active` (agent accepts),
/// `active -> waiting` (agent disconnects), `active -> closed`,
/// `waiting -> closed`. `closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Active,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Active => "active",
            SessionStatus::Closed => "closed",
        }
    }

    /// Parse the textual form stored in the database.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(SessionStatus::Waiting),
            "active" => Some(SessionStatus::Active),
            "closed" => Some(SessionStatus::Closed),
            _ => None,
        }
    }

    /// Whether the session state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Waiting, Active) | (Active, Waiting) | (Active, Closed) | (Waiting, Closed)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the conversation sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    User,
    Agent,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::User => "user",
            SenderRole::Agent => "agent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(SenderRole::User),
            "agent" => Some(SenderRole::Agent),
            _ => None,
        }
    }
}

impl fmt::Display for SenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One support conversation between a site visitor and a staff agent.
///
/// Sessions are never physically deleted; closed sessions remain queryable
/// history. The agent fields are either both set or both null.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportSession {
    pub id: Uuid,
    /// Platform user id, when the visitor is signed in. Anonymous visitors
    /// may start sessions without one.
    pub user_id: Option<String>,
    pub user_name: String,
    pub user_email: String,
    pub status: SessionStatus,
    pub agent_id: Option<String>,
    pub agent_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub body: String,
    pub sender_role: SenderRole,
    pub sender_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
