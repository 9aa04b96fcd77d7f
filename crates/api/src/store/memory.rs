//! In-memory session store
//!
//! Used by tests and database-less development. Conditional transitions run
//! under a single write lock, which gives the same first-writer-wins
//! semantics as the Postgres store's conditional UPDATEs.

use async_trait::async_trait;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use trailtalk_shared::{SessionStatus, SupportError, SupportMessage, SupportSession};

use super::{NewMessage, NewSession, SessionStore, Transition};

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, SupportSession>,
    messages: HashMap<Uuid, Vec<SupportMessage>>,
}

#[derive(Default)]
pub struct MemorySessionStore {
    inner: RwLock<Inner>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, new: NewSession) -> Result<SupportSession, SupportError> {
        let session = SupportSession {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            user_name: new.user_name,
            user_email: new.user_email,
            status: SessionStatus::Waiting,
            agent_id: None,
            agent_name: None,
            created_at: OffsetDateTime::now_utc(),
            closed_at: None,
        };

        let mut inner = self.inner.write().await;
        inner.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn session(&self, id: Uuid) -> Result<Option<SupportSession>, SupportError> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.get(&id).cloned())
    }

    async fn claim_session(
        &self,
        id: Uuid,
        agent_id: &str,
        agent_name: &str,
    ) -> Result<Transition, SupportError> {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.sessions.get_mut(&id) else {
            return Ok(Transition::NotFound);
        };

        if session.status != SessionStatus::Waiting {
            return Ok(Transition::Rejected(session.clone()));
        }

        session.status = SessionStatus::Active;
        session.agent_id = Some(agent_id.to_string());
        session.agent_name = Some(agent_name.to_string());
        Ok(Transition::Applied(session.clone()))
    }

    async fn release_session(&self, id: Uuid) -> Result<Transition, SupportError> {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.sessions.get_mut(&id) else {
            return Ok(Transition::NotFound);
        };

        if session.status != SessionStatus::Active {
            return Ok(Transition::Rejected(session.clone()));
        }

        session.status = SessionStatus::Waiting;
        session.agent_id = None;
        session.agent_name = None;
        Ok(Transition::Applied(session.clone()))
    }

    async fn close_session(&self, id: Uuid) -> Result<Transition, SupportError> {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.sessions.get_mut(&id) else {
            return Ok(Transition::NotFound);
        };

        if !session.status.can_transition_to(SessionStatus::Closed) {
            return Ok(Transition::Rejected(session.clone()));
        }

        session.status = SessionStatus::Closed;
        session.closed_at = Some(OffsetDateTime::now_utc());
        Ok(Transition::Applied(session.clone()))
    }

    async fn append_message(&self, new: NewMessage) -> Result<SupportMessage, SupportError> {
        let mut inner = self.inner.write().await;
        if !inner.sessions.contains_key(&new.session_id) {
            return Err(SupportError::NotFound(format!("session {}", new.session_id)));
        }

        let message = SupportMessage {
            id: Uuid::new_v4(),
            session_id: new.session_id,
            body: new.body,
            sender_role: new.sender_role,
            sender_name: new.sender_name,
            created_at: OffsetDateTime::now_utc(),
        };

        inner
            .messages
            .entry(new.session_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn messages(&self, session_id: Uuid) -> Result<Vec<SupportMessage>, SupportError> {
        let inner = self.inner.read().await;
        Ok(inner.messages.get(&session_id).cloned().unwrap_or_default())
    }

    async fn sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> Result<Vec<SupportSession>, SupportError> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<_> = inner
            .sessions
            .values()
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }
}
