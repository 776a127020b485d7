use async_trait::async_trait;
use sqlx::Error as SqlxError;
use uuid::Uuid;

use crate::models::{EventRow, MarkerRow, NewMarker, SessionRow};

/// Durable storage boundary for sessions, markers and the event log.
///
/// The protocol handlers are written against this trait so they can run
/// against the Postgres-backed [`DbCollab`](crate::db::dbcollab::DbCollab)
/// in production and an in-memory store in tests.
#[async_trait]
pub trait CollabStore: Send + Sync {
    /// Create a new active session with an empty allow-list.
    async fn create_session(
        &self,
        document_id: Uuid,
        owner_id: &str,
        session_name: &str,
    ) -> Result<SessionRow, SqlxError>;

    async fn get_session(&self, session_id: Uuid) -> Result<Option<SessionRow>, SqlxError>;

    /// Idempotently append `user_id` to the session allow-list.
    ///
    /// Returns the refreshed row, or `None` if the session does not exist.
    async fn invite_user(
        &self,
        session_id: Uuid,
        user_id: &str,
    ) -> Result<Option<SessionRow>, SqlxError>;

    /// Persist a new marker.
    ///
    /// For `viewing` markers the store deactivates any prior active
    /// viewing marker of the same (session, user, section) tuple in the
    /// same transaction, so at most one stays active.
    async fn insert_marker(&self, marker: NewMarker) -> Result<MarkerRow, SqlxError>;

    /// Soft-deactivate one marker. Returns whether a row was flipped.
    async fn deactivate_marker(&self, marker_id: Uuid) -> Result<bool, SqlxError>;

    /// Soft-deactivate every active marker a user authored in a session.
    /// Returns the number of rows flipped.
    async fn deactivate_user_markers(
        &self,
        session_id: Uuid,
        user_id: &str,
    ) -> Result<u64, SqlxError>;

    /// All active, unexpired markers for a session, oldest first.
    async fn active_markers(&self, session_id: Uuid) -> Result<Vec<MarkerRow>, SqlxError>;

    /// Append one audit event. Events are write-once.
    async fn append_event(
        &self,
        session_id: Uuid,
        user_id: &str,
        event_type: &str,
        event_data: serde_json::Value,
    ) -> Result<EventRow, SqlxError>;

    /// Bulk-deactivate every active marker whose expiry has passed.
    /// Returns the number of rows flipped.
    async fn deactivate_expired_markers(&self) -> Result<u64, SqlxError>;
}
