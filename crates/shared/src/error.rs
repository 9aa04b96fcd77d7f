//! Error types for TrailTalk

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupportError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for SupportError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = ?err, "database error");
        match err {
            sqlx::Error::RowNotFound => SupportError::NotFound("row not found".to_string()),
            other => SupportError::Database(other.to_string()),
        }
    }
}
