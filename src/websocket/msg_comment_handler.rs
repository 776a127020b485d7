use serde_json::json;
use tracing::info;

use crate::db::store::CollabStore;
use crate::models::{
    CollabError, CommentAddedMessage, CommentMessage, CommentPayload, MarkerType, NewMarker,
    OutboundMessage, EVENT_COMMENT,
};
use crate::registry::SessionRegistry;
use crate::websocket::handler::ClientSession;

/// Handle a `comment` message: persist a commenting marker (no expiry),
/// append the audit event, then fan out `comment_added` with the full
/// payload to every connection including the sender.
pub async fn handle_comment_message<S: CollabStore + ?Sized>(
    msg: &CommentMessage,
    cs: &ClientSession,
    store: &S,
    registry: &SessionRegistry,
) -> Result<(), CollabError> {
    let marker = store
        .insert_marker(NewMarker {
            session_id: cs.session_id,
            user: cs.user.clone(),
            section_id: msg.data.section_id.clone(),
            marker_type: MarkerType::Commenting,
            position: msg.data.position.clone(),
            content: Some(msg.data.content.clone()),
        })
        .await
        .map_err(|e| CollabError::PersistenceFailure(e.to_string()))?;

    store
        .append_event(
            cs.session_id,
            &cs.user.user_id,
            EVENT_COMMENT,
            json!({
                "markerId": marker.id,
                "sectionId": msg.data.section_id,
            }),
        )
        .await
        .map_err(|e| CollabError::PersistenceFailure(e.to_string()))?;

    info!(
        "User {} commented on section '{}' in session {}",
        cs.user.user_id, msg.data.section_id, cs.session_id
    );

    registry
        .broadcast(
            cs.session_id,
            &OutboundMessage::CommentAdded(CommentAddedMessage {
                session_id: cs.session_id,
                comment: CommentPayload {
                    id: marker.id,
                    user: cs.user.clone(),
                    section_id: marker.section_id,
                    content: msg.data.content.clone(),
                    position: marker.position,
                    created_at: marker.created_at,
                },
            }),
            None,
        )
        .await;

    Ok(())
}
