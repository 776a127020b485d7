use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::messages::UserRef;

/// TTL for `viewing` markers (live section-focus indicators).
pub const VIEWING_MARKER_TTL_SECS: i64 = 5 * 60;

/// TTL for general (non-comment) markers.
pub const GENERAL_MARKER_TTL_SECS: i64 = 30 * 60;

/// The kind of annotation a marker represents.
///
/// `viewing` and `editing` carry no required content; `commenting`
/// requires `content`. Stored as lowercase text in the database and on
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MarkerType {
    Viewing,
    Commenting,
    Editing,
}

impl MarkerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerType::Viewing => "viewing",
            MarkerType::Commenting => "commenting",
            MarkerType::Editing => "editing",
        }
    }

    /// Time-to-live for this marker type. Comments never expire.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            MarkerType::Viewing => Some(Duration::seconds(VIEWING_MARKER_TTL_SECS)),
            MarkerType::Commenting => None,
            MarkerType::Editing => Some(Duration::seconds(GENERAL_MARKER_TTL_SECS)),
        }
    }
}

impl std::fmt::Display for MarkerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marker row from the database
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: String,
    pub user_name: String,
    pub section_id: String,
    pub marker_type: MarkerType,
    pub position: serde_json::Value,
    pub content: Option<String>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A marker about to be persisted. The id, activity flag and timestamps
/// are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMarker {
    pub session_id: Uuid,
    pub user: UserRef,
    pub section_id: String,
    pub marker_type: MarkerType,
    pub position: serde_json::Value,
    pub content: Option<String>,
}

impl NewMarker {
    /// Expiry timestamp for this marker relative to `now`, per its type.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.marker_type.ttl().map(|ttl| now + ttl)
    }
}
