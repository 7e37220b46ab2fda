//! Error types for the session orchestrator.
//!
//! Mirrors the predicate-vs-misuse split in `mrcp_media_core::MediaError`:
//! conditions the spec's error table resolves into an answer status (unknown
//! resource, engine channel failures) are carried as data on the answer, not
//! as `Err`. `SessionError` is for genuine misuse of the orchestrator's API —
//! an unknown session id, a state transition attempted out of order, or an
//! internal collaborator failure with no better home.

use crate::types::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no session with id {0}")]
    SessionNotFound(SessionId),

    #[error("invalid state transition: {0}")]
    InvalidState(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl SessionError {
    pub fn session_not_found(id: &SessionId) -> Self {
        SessionError::SessionNotFound(id.clone())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        SessionError::InvalidState(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SessionError::Internal(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
