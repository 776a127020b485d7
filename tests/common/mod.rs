use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::extract::ws::Message;
use chrono::{Duration, Utc};
use sqlx::Error as SqlxError;
use tokio::sync::mpsc;
use uuid::Uuid;

use finsight_collab::db::store::CollabStore;
use finsight_collab::models::{
    EventRow, MarkerRow, MarkerType, NewMarker, OutboundMessage, SessionRow, UserRef,
};

/// In-memory `CollabStore` with the same semantics as the Postgres
/// implementation, used to drive the protocol handlers in tests.
#[derive(Default)]
pub struct MemStore {
    sessions: Mutex<HashMap<Uuid, SessionRow>>,
    markers: Mutex<Vec<MarkerRow>>,
    events: Mutex<Vec<EventRow>>,
    fail_writes: AtomicBool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, to exercise the
    /// no-broadcast-on-failed-persistence rule.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn write_guard(&self) -> Result<(), SqlxError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(SqlxError::Protocol("simulated write failure".into()))
        } else {
            Ok(())
        }
    }

    pub fn seed_session(&self, owner: &str, allowed: &[&str]) -> SessionRow {
        let now = Utc::now();
        let session = SessionRow {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            owner_id: owner.to_string(),
            session_name: "Q3 analysis review".to_string(),
            allowed_users: allowed.iter().map(|s| s.to_string()).collect(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.sessions.lock().unwrap().insert(session.id, session.clone());
        session
    }

    /// Force a marker's expiry into the past, as if its TTL elapsed.
    pub fn expire_marker(&self, marker_id: Uuid) {
        let mut markers = self.markers.lock().unwrap();
        let marker = markers
            .iter_mut()
            .find(|m| m.id == marker_id)
            .expect("marker to expire must exist");
        marker.expires_at = Some(Utc::now() - Duration::minutes(1));
    }

    pub fn marker(&self, marker_id: Uuid) -> Option<MarkerRow> {
        self.markers.lock().unwrap().iter().find(|m| m.id == marker_id).cloned()
    }

    pub fn active_marker_count(&self, session_id: Uuid) -> usize {
        self.markers
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.session_id == session_id && m.is_active)
            .count()
    }

    pub fn events_of_type(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl CollabStore for MemStore {
    async fn create_session(
        &self,
        document_id: Uuid,
        owner_id: &str,
        session_name: &str,
    ) -> Result<SessionRow, SqlxError> {
        self.write_guard()?;
        let now = Utc::now();
        let session = SessionRow {
            id: Uuid::new_v4(),
            document_id,
            owner_id: owner_id.to_string(),
            session_name: session_name.to_string(),
            allowed_users: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.sessions.lock().unwrap().insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<SessionRow>, SqlxError> {
        Ok(self.sessions.lock().unwrap().get(&session_id).cloned())
    }

    async fn invite_user(
        &self,
        session_id: Uuid,
        user_id: &str,
    ) -> Result<Option<SessionRow>, SqlxError> {
        self.write_guard()?;
        let mut sessions = self.sessions.lock().unwrap();
        let Some(session) = sessions.get_mut(&session_id) else {
            return Ok(None);
        };
        if !session.allowed_users.iter().any(|u| u == user_id) {
            session.allowed_users.push(user_id.to_string());
            session.updated_at = Utc::now();
        }
        Ok(Some(session.clone()))
    }

    async fn insert_marker(&self, marker: NewMarker) -> Result<MarkerRow, SqlxError> {
        self.write_guard()?;
        let now = Utc::now();
        let mut markers = self.markers.lock().unwrap();

        if marker.marker_type == MarkerType::Viewing {
            for existing in markers.iter_mut() {
                if existing.session_id == marker.session_id
                    && existing.user_id == marker.user.user_id
                    && existing.section_id == marker.section_id
                    && existing.marker_type == MarkerType::Viewing
                    && existing.is_active
                {
                    existing.is_active = false;
                }
            }
        }

        let expires_at = marker.expires_at(now);
        let row = MarkerRow {
            id: Uuid::new_v4(),
            session_id: marker.session_id,
            user_id: marker.user.user_id.clone(),
            user_name: marker.user.user_name.clone(),
            section_id: marker.section_id,
            marker_type: marker.marker_type,
            position: marker.position,
            content: marker.content,
            is_active: true,
            expires_at,
            created_at: now,
        };
        markers.push(row.clone());
        Ok(row)
    }

    async fn deactivate_marker(&self, marker_id: Uuid) -> Result<bool, SqlxError> {
        self.write_guard()?;
        let mut markers = self.markers.lock().unwrap();
        for marker in markers.iter_mut() {
            if marker.id == marker_id && marker.is_active {
                marker.is_active = false;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn deactivate_user_markers(
        &self,
        session_id: Uuid,
        user_id: &str,
    ) -> Result<u64, SqlxError> {
        self.write_guard()?;
        let mut flipped = 0;
        let mut markers = self.markers.lock().unwrap();
        for marker in markers.iter_mut() {
            if marker.session_id == session_id && marker.user_id == user_id && marker.is_active {
                marker.is_active = false;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn active_markers(&self, session_id: Uuid) -> Result<Vec<MarkerRow>, SqlxError> {
        let now = Utc::now();
        let mut rows: Vec<MarkerRow> = self
            .markers
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                m.session_id == session_id
                    && m.is_active
                    && m.expires_at.map_or(true, |expiry| expiry > now)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.created_at);
        Ok(rows)
    }

    async fn append_event(
        &self,
        session_id: Uuid,
        user_id: &str,
        event_type: &str,
        event_data: serde_json::Value,
    ) -> Result<EventRow, SqlxError> {
        self.write_guard()?;
        let event = EventRow {
            id: Uuid::new_v4(),
            session_id,
            user_id: user_id.to_string(),
            event_type: event_type.to_string(),
            event_data,
            created_at: Utc::now(),
        };
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn deactivate_expired_markers(&self) -> Result<u64, SqlxError> {
        self.write_guard()?;
        let now = Utc::now();
        let mut flipped = 0;
        let mut markers = self.markers.lock().unwrap();
        for marker in markers.iter_mut() {
            if marker.is_active && marker.expires_at.map_or(false, |expiry| expiry < now) {
                marker.is_active = false;
                flipped += 1;
            }
        }
        Ok(flipped)
    }
}

pub fn user(id: &str, name: &str) -> UserRef {
    UserRef {
        user_id: id.to_string(),
        user_name: name.to_string(),
        profile_image: None,
    }
}

/// Pop the next frame a connection received and decode it.
pub fn recv_msg(rx: &mut mpsc::UnboundedReceiver<Message>) -> OutboundMessage {
    match rx.try_recv().expect("expected a queued message") {
        Message::Text(text) => serde_json::from_str(&text).expect("frame must decode"),
        other => panic!("expected text frame, got {:?}", other),
    }
}

/// Pop the next frame if any.
pub fn try_recv_msg(rx: &mut mpsc::UnboundedReceiver<Message>) -> Option<OutboundMessage> {
    match rx.try_recv() {
        Ok(Message::Text(text)) => Some(serde_json::from_str(&text).expect("frame must decode")),
        Ok(other) => panic!("expected text frame, got {:?}", other),
        Err(_) => None,
    }
}
