//! Error types for Studydeck.

use studydeck_types::ToolKind;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("{0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Invalid {tool} transition: {reason}")]
    InvalidTransition { tool: ToolKind, reason: String },

    #[error("AI service error: {0}")]
    Ai(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Password hashing error: {0}")]
    HashError(#[from] bcrypt::BcryptError),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl StudyError {
    pub(crate) fn transition(tool: ToolKind, reason: impl ToString) -> Self {
        StudyError::InvalidTransition {
            tool,
            reason: reason.to_string(),
        }
    }
}
