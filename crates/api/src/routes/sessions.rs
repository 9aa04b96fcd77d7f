//! Read-only session endpoints for the agent dashboard
//!
//! Mutations go through the real-time channel; these routes only reconstruct
//! queue views and transcripts.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use trailtalk_shared::{SessionStatus, SupportMessage, SupportSession};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub status: Option<SessionStatus>,
}

/// List sessions, optionally filtered by status (`?status=waiting` is the
/// support queue).
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<Json<Vec<SupportSession>>> {
    let sessions = state.store.sessions(query.status).await?;
    Ok(Json(sessions))
}

/// Fetch one session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SupportSession>> {
    let session = state
        .store
        .session(session_id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(session))
}

/// Full transcript of a session, in send order.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<Vec<SupportMessage>>> {
    if state.store.session(session_id).await?.is_none() {
        return Err(ApiError::NotFound);
    }
    let messages = state.store.messages(session_id).await?;
    Ok(Json(messages))
}
