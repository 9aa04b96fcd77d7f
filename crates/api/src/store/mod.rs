//! Durable session storage
//!
//! The store is the single source of truth for session state. Every status
//! change is a conditional write keyed on the expected prior status, so two
//! racing callers cannot both observe success: the first writer wins and
//! later writers get [`Transition::Rejected`].

mod memory;
mod postgres;

pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;

use async_trait::async_trait;
use uuid::Uuid;

use trailtalk_shared::{SenderRole, SessionStatus, SupportError, SupportMessage, SupportSession};

/// Fields for a new session record.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: Option<String>,
    pub user_name: String,
    pub user_email: String,
}

/// Fields for a new message record.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: Uuid,
    pub body: String,
    pub sender_role: SenderRole,
    pub sender_name: String,
}

/// Outcome of a conditional status transition.
#[derive(Debug)]
pub enum Transition {
    /// The write applied; the returned record reflects the new state.
    Applied(SupportSession),
    /// The session exists but was not in the required prior state. The
    /// returned record is the current (unchanged) state.
    Rejected(SupportSession),
    NotFound,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session with status `waiting`.
    async fn create_session(&self, new: NewSession) -> Result<SupportSession, SupportError>;

    async fn session(&self, id: Uuid) -> Result<Option<SupportSession>, SupportError>;

    /// Atomically claim a waiting session for an agent (`waiting -> active`).
    async fn claim_session(
        &self,
        id: Uuid,
        agent_id: &str,
        agent_name: &str,
    ) -> Result<Transition, SupportError>;

    /// Revert an active session to the waiting queue, clearing the agent
    /// fields (`active -> waiting`).
    async fn release_session(&self, id: Uuid) -> Result<Transition, SupportError>;

    /// Close a waiting or active session, stamping `closed_at`.
    async fn close_session(&self, id: Uuid) -> Result<Transition, SupportError>;

    async fn append_message(&self, new: NewMessage) -> Result<SupportMessage, SupportError>;

    /// All messages of a session, in send order.
    async fn messages(&self, session_id: Uuid) -> Result<Vec<SupportMessage>, SupportError>;

    /// Sessions, optionally filtered by status. `waiting` reconstructs the
    /// support queue.
    async fn sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> Result<Vec<SupportSession>, SupportError>;

    /// Readiness probe.
    async fn healthy(&self) -> bool {
        true
    }
}
