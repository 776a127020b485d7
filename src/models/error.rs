use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::messages::ErrorMessage;

/// Response for an error
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u16,
    pub status: String,
    pub error: String,
}

/// Per-connection protocol failure. Always reported privately to the
/// originating connection, never broadcast, and never fatal to the
/// connection itself.
#[derive(Debug)]
pub enum CollabError {
    SessionNotFound(Uuid),
    Unauthorized,
    NotJoined,
    AlreadyJoined,
    MalformedMessage(String),
    PersistenceFailure(String),
}

impl CollabError {
    /// Stable wire code for the `error` reply.
    pub fn code(&self) -> &'static str {
        match self {
            CollabError::SessionNotFound(_) => "session_not_found",
            CollabError::Unauthorized => "unauthorized",
            CollabError::NotJoined => "not_joined",
            CollabError::AlreadyJoined => "already_joined",
            CollabError::MalformedMessage(_) => "malformed_message",
            CollabError::PersistenceFailure(_) => "persistence_failure",
        }
    }

    pub fn to_error_message(&self) -> ErrorMessage {
        ErrorMessage {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl std::fmt::Display for CollabError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollabError::SessionNotFound(id) => {
                write!(f, "Collaboration session '{}' not found", id)
            }
            CollabError::Unauthorized => {
                write!(f, "User is not permitted to join this session")
            }
            CollabError::NotJoined => {
                write!(f, "Join a session before sending collaboration messages")
            }
            CollabError::AlreadyJoined => {
                write!(f, "Connection already joined a session")
            }
            CollabError::MalformedMessage(reason) => {
                write!(f, "Malformed message: {}", reason)
            }
            CollabError::PersistenceFailure(reason) => {
                write!(f, "Persistence failure: {}", reason)
            }
        }
    }
}

impl std::error::Error for CollabError {}
