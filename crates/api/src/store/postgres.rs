//! Postgres-backed session store

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use trailtalk_shared::{SenderRole, SessionStatus, SupportError, SupportMessage, SupportSession};

use super::{NewMessage, NewSession, SessionStore, Transition};

const SESSION_COLUMNS: &str =
    "id, user_id, user_name, user_email, status, agent_id, agent_name, created_at, closed_at";

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_session(&self, id: Uuid) -> Result<Option<SupportSession>, SupportError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM support_sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionRow::into_session).transpose()
    }

    /// Shared tail for the conditional-update operations: when the UPDATE
    /// matched no row, distinguish "wrong prior state" from "no such session".
    async fn transition_outcome(
        &self,
        id: Uuid,
        updated: Option<SessionRow>,
    ) -> Result<Transition, SupportError> {
        match updated {
            Some(row) => Ok(Transition::Applied(row.into_session()?)),
            None => match self.fetch_session(id).await? {
                Some(session) => Ok(Transition::Rejected(session)),
                None => Ok(Transition::NotFound),
            },
        }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(&self, new: NewSession) -> Result<SupportSession, SupportError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "INSERT INTO support_sessions (id, user_id, user_name, user_email, status)
             VALUES ($1, $2, $3, $4, 'waiting')
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.user_id)
        .bind(&new.user_name)
        .bind(&new.user_email)
        .fetch_one(&self.pool)
        .await?;

        row.into_session()
    }

    async fn session(&self, id: Uuid) -> Result<Option<SupportSession>, SupportError> {
        self.fetch_session(id).await
    }

    async fn claim_session(
        &self,
        id: Uuid,
        agent_id: &str,
        agent_name: &str,
    ) -> Result<Transition, SupportError> {
        // Conditional write: first claimer wins, later claimers match no row.
        let updated = sqlx::query_as::<_, SessionRow>(&format!(
            "UPDATE support_sessions
             SET status = 'active', agent_id = $2, agent_name = $3
             WHERE id = $1 AND status = 'waiting'
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id)
        .bind(agent_id)
        .bind(agent_name)
        .fetch_optional(&self.pool)
        .await?;

        self.transition_outcome(id, updated).await
    }

    async fn release_session(&self, id: Uuid) -> Result<Transition, SupportError> {
        let updated = sqlx::query_as::<_, SessionRow>(&format!(
            "UPDATE support_sessions
             SET status = 'waiting', agent_id = NULL, agent_name = NULL
             WHERE id = $1 AND status = 'active'
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.transition_outcome(id, updated).await
    }

    async fn close_session(&self, id: Uuid) -> Result<Transition, SupportError> {
        let updated = sqlx::query_as::<_, SessionRow>(&format!(
            "UPDATE support_sessions
             SET status = 'closed', closed_at = NOW()
             WHERE id = $1 AND status IN ('waiting', 'active')
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        self.transition_outcome(id, updated).await
    }

    async fn append_message(&self, new: NewMessage) -> Result<SupportMessage, SupportError> {
        let row = sqlx::query_as::<_, MessageRow>(
            "INSERT INTO support_messages (id, session_id, body, sender_role, sender_name)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, session_id, body, sender_role, sender_name, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(new.session_id)
        .bind(&new.body)
        .bind(new.sender_role.as_str())
        .bind(&new.sender_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match &err {
            // foreign key violation: the session does not exist
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
                SupportError::NotFound(format!("session {}", new.session_id))
            }
            _ => SupportError::from(err),
        })?;

        row.into_message()
    }

    async fn messages(&self, session_id: Uuid) -> Result<Vec<SupportMessage>, SupportError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, session_id, body, sender_role, sender_name, created_at
             FROM support_messages
             WHERE session_id = $1
             ORDER BY created_at, id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MessageRow::into_message).collect()
    }

    async fn sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> Result<Vec<SupportSession>, SupportError> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, SessionRow>(&format!(
                    "SELECT {SESSION_COLUMNS} FROM support_sessions
                     WHERE status = $1 ORDER BY created_at"
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, SessionRow>(&format!(
                    "SELECT {SESSION_COLUMNS} FROM support_sessions ORDER BY created_at"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(SessionRow::into_session).collect()
    }

    async fn healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Row types
// =============================================================================

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Option<String>,
    user_name: String,
    user_email: String,
    status: String,
    agent_id: Option<String>,
    agent_name: Option<String>,
    created_at: OffsetDateTime,
    closed_at: Option<OffsetDateTime>,
}

impl SessionRow {
    fn into_session(self) -> Result<SupportSession, SupportError> {
        let status = SessionStatus::parse(&self.status)
            .ok_or_else(|| SupportError::Internal(format!("unknown status '{}'", self.status)))?;

        Ok(SupportSession {
            id: self.id,
            user_id: self.user_id,
            user_name: self.user_name,
            user_email: self.user_email,
            status,
            agent_id: self.agent_id,
            agent_name: self.agent_name,
            created_at: self.created_at,
            closed_at: self.closed_at,
        })
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: Uuid,
    session_id: Uuid,
    body: String,
    sender_role: String,
    sender_name: String,
    created_at: OffsetDateTime,
}

impl MessageRow {
    fn into_message(self) -> Result<SupportMessage, SupportError> {
        let sender_role = SenderRole::parse(&self.sender_role).ok_or_else(|| {
            SupportError::Internal(format!("unknown sender role '{}'", self.sender_role))
        })?;

        Ok(SupportMessage {
            id: self.id,
            session_id: self.session_id,
            body: self.body,
            sender_role,
            sender_name: self.sender_name,
            created_at: self.created_at,
        })
    }
}
