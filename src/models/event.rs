use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const EVENT_JOIN: &str = "join";
pub const EVENT_LEAVE: &str = "leave";
pub const EVENT_COMMENT: &str = "comment";

/// Append-only audit record of a session lifecycle occurrence.
///
/// Events are write-once and never consulted to rebuild live state; the
/// registry and the active markers are the live state.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EventRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: String,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
