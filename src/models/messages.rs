use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::marker::{MarkerRow, MarkerType};

/// Pre-resolved identity attached to every inbound message.
///
/// Authentication happens upstream; this service only checks session
/// membership.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: String,
    pub user_name: String,
    pub profile_image: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct JoinMessage {
    pub session_id: Uuid,
    pub user: UserRef,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LeaveMessage {
    pub session_id: Uuid,
    pub user: UserRef,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MarkerUpdateMessage {
    pub session_id: Uuid,
    pub user: UserRef,
    pub data: MarkerUpdateData,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MarkerUpdateData {
    pub section_id: String,
    pub marker_type: MarkerType,
    /// Opaque line/column/selection payload, passed through untouched.
    #[serde(default)]
    pub position: serde_json::Value,
    pub content: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRemoveMessage {
    pub session_id: Uuid,
    pub user: UserRef,
    pub data: MarkerRemoveData,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRemoveData {
    pub marker_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommentMessage {
    pub session_id: Uuid,
    pub user: UserRef,
    pub data: CommentData,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CommentData {
    pub section_id: String,
    pub content: String,
    #[serde(default)]
    pub position: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CursorMoveMessage {
    pub session_id: Uuid,
    pub user: UserRef,
    pub data: CursorMoveData,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CursorMoveData {
    pub section_id: String,
    #[serde(default)]
    pub position: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SectionViewMessage {
    pub session_id: Uuid,
    pub user: UserRef,
    pub data: SectionViewData,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SectionViewData {
    pub section_id: String,
    #[serde(default)]
    pub position: serde_json::Value,
}

/// Every message a client may send over the collaboration channel.
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "join")]
    Join(JoinMessage),
    #[serde(rename = "leave")]
    Leave(LeaveMessage),
    #[serde(rename = "marker_update")]
    MarkerUpdate(MarkerUpdateMessage),
    #[serde(rename = "marker_remove")]
    MarkerRemove(MarkerRemoveMessage),
    #[serde(rename = "comment")]
    Comment(CommentMessage),
    #[serde(rename = "cursor_move")]
    CursorMove(CursorMoveMessage),
    #[serde(rename = "section_view")]
    SectionView(SectionViewMessage),
}

impl InboundMessage {
    /// The session the message addresses, regardless of variant.
    pub fn session_id(&self) -> Uuid {
        match self {
            InboundMessage::Join(m) => m.session_id,
            InboundMessage::Leave(m) => m.session_id,
            InboundMessage::MarkerUpdate(m) => m.session_id,
            InboundMessage::MarkerRemove(m) => m.session_id,
            InboundMessage::Comment(m) => m.session_id,
            InboundMessage::CursorMove(m) => m.session_id,
            InboundMessage::SectionView(m) => m.session_id,
        }
    }
}

/// Full-state replay sent privately to a connection that just joined.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionStateMessage {
    pub session_id: Uuid,
    pub markers: Vec<MarkerRow>,
    pub active_users: Vec<UserRef>,
}

/// `user_joined` / `user_left` payload with the refreshed roster.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChangeMessage {
    pub session_id: Uuid,
    pub user: UserRef,
    pub active_users: Vec<UserRef>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MarkerAddedMessage {
    pub session_id: Uuid,
    pub user: UserRef,
    pub marker: MarkerRow,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRemovedMessage {
    pub session_id: Uuid,
    pub marker_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommentPayload {
    pub id: Uuid,
    pub user: UserRef,
    pub section_id: String,
    pub content: String,
    pub position: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommentAddedMessage {
    pub session_id: Uuid,
    pub comment: CommentPayload,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CursorMoveBroadcast {
    pub session_id: Uuid,
    pub user: UserRef,
    pub section_id: String,
    pub position: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SectionViewedMessage {
    pub session_id: Uuid,
    pub user: UserRef,
    pub section_id: String,
    pub marker: MarkerRow,
}

/// Private error reply. Never broadcast.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
}

/// Every message the server may send over the collaboration channel.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "session_state")]
    SessionState(SessionStateMessage),
    #[serde(rename = "user_joined")]
    UserJoined(PresenceChangeMessage),
    #[serde(rename = "user_left")]
    UserLeft(PresenceChangeMessage),
    #[serde(rename = "marker_added")]
    MarkerAdded(MarkerAddedMessage),
    #[serde(rename = "marker_removed")]
    MarkerRemoved(MarkerRemovedMessage),
    #[serde(rename = "comment_added")]
    CommentAdded(CommentAddedMessage),
    #[serde(rename = "cursor_move")]
    CursorMove(CursorMoveBroadcast),
    #[serde(rename = "section_viewed")]
    SectionViewed(SectionViewedMessage),
    #[serde(rename = "error")]
    Error(ErrorMessage),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_join_envelope() {
        let raw = json!({
            "type": "join",
            "sessionId": "550e8400-e29b-41d4-a716-446655440000",
            "user": {
                "userId": "u-1",
                "userName": "Ada",
                "profileImage": "https://img.example/ada.png"
            }
        });
        let msg: InboundMessage = serde_json::from_value(raw).unwrap();
        match msg {
            InboundMessage::Join(join) => {
                assert_eq!(join.user.user_id, "u-1");
                assert_eq!(join.user.user_name, "Ada");
            }
            other => panic!("expected join, got {:?}", other),
        }
    }

    #[test]
    fn parses_comment_envelope_with_data() {
        let raw = json!({
            "type": "comment",
            "sessionId": "550e8400-e29b-41d4-a716-446655440000",
            "user": { "userId": "u-1", "userName": "Ada" },
            "data": {
                "sectionId": "financial_metrics",
                "content": "check this number",
                "position": { "line": 12, "column": 4 }
            }
        });
        let msg: InboundMessage = serde_json::from_value(raw).unwrap();
        match msg {
            InboundMessage::Comment(c) => {
                assert_eq!(c.data.section_id, "financial_metrics");
                assert_eq!(c.data.content, "check this number");
                assert_eq!(c.data.position["line"], 12);
                // profileImage was absent and must stay optional
                assert!(c.user.profile_image.is_none());
            }
            other => panic!("expected comment, got {:?}", other),
        }
    }

    #[test]
    fn missing_position_defaults_to_null() {
        let raw = json!({
            "type": "cursor_move",
            "sessionId": "550e8400-e29b-41d4-a716-446655440000",
            "user": { "userId": "u-1", "userName": "Ada" },
            "data": { "sectionId": "revenue" }
        });
        let msg: InboundMessage = serde_json::from_value(raw).unwrap();
        match msg {
            InboundMessage::CursorMove(c) => assert!(c.data.position.is_null()),
            other => panic!("expected cursor_move, got {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_message_type() {
        let raw = json!({
            "type": "teleport",
            "sessionId": "550e8400-e29b-41d4-a716-446655440000",
            "user": { "userId": "u-1", "userName": "Ada" }
        });
        assert!(serde_json::from_value::<InboundMessage>(raw).is_err());
    }

    #[test]
    fn rejects_comment_without_content() {
        let raw = json!({
            "type": "comment",
            "sessionId": "550e8400-e29b-41d4-a716-446655440000",
            "user": { "userId": "u-1", "userName": "Ada" },
            "data": { "sectionId": "revenue" }
        });
        assert!(serde_json::from_value::<InboundMessage>(raw).is_err());
    }

    #[test]
    fn outbound_error_carries_type_tag() {
        let msg = OutboundMessage::Error(ErrorMessage {
            code: "unauthorized".to_string(),
            message: "user is not on the session allow-list".to_string(),
        });
        let raw = serde_json::to_value(&msg).unwrap();
        assert_eq!(raw["type"], "error");
        assert_eq!(raw["code"], "unauthorized");
    }

    #[test]
    fn outbound_presence_change_uses_camel_case() {
        let msg = OutboundMessage::UserJoined(PresenceChangeMessage {
            session_id: Uuid::new_v4(),
            user: UserRef {
                user_id: "u-2".to_string(),
                user_name: "Grace".to_string(),
                profile_image: None,
            },
            active_users: vec![],
        });
        let raw = serde_json::to_value(&msg).unwrap();
        assert_eq!(raw["type"], "user_joined");
        assert!(raw.get("activeUsers").is_some());
        assert!(raw.get("active_users").is_none());
    }
}
