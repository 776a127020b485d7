use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Collaboration session row from the database
///
/// One session binds a group of collaborators to a single analysis
/// report. Sessions are never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SessionRow {
    pub id: Uuid,
    pub document_id: Uuid,
    pub owner_id: String,
    pub session_name: String,
    pub allowed_users: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRow {
    /// Whether `user_id` may join this session.
    ///
    /// The owner is always permitted; an empty allow-list means the
    /// session is open to everyone.
    pub fn permits(&self, user_id: &str) -> bool {
        self.owner_id == user_id
            || self.allowed_users.is_empty()
            || self.allowed_users.iter().any(|u| u == user_id)
    }
}

/// Request body for creating a collaboration session
#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// The analysis report this session annotates
    pub document_id: Uuid,
    pub owner_id: String,
    pub session_name: String,
}

/// Response body for a created collaboration session
#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

/// Request body for inviting a user to a session
#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteUserRequest {
    pub user_id: String,
}

/// Response body after an invitation
#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteUserResponse {
    pub session_id: Uuid,
    pub allowed_users: Vec<String>,
}
