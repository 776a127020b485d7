use tracing::debug;

use crate::db::store::CollabStore;
use crate::models::{
    CollabError, MarkerAddedMessage, MarkerRemoveMessage, MarkerRemovedMessage,
    MarkerUpdateMessage, MarkerType, NewMarker, OutboundMessage,
};
use crate::registry::SessionRegistry;
use crate::websocket::handler::ClientSession;

/// Handle a `marker_update` message: persist a new marker, then fan out
/// `marker_added` to the whole session including the sender, who
/// reconciles its optimistic rendering against the persisted row.
///
/// The broadcast only happens once the write succeeded; a failed write
/// yields a private error instead.
pub async fn handle_marker_update_message<S: CollabStore + ?Sized>(
    msg: &MarkerUpdateMessage,
    cs: &ClientSession,
    store: &S,
    registry: &SessionRegistry,
) -> Result<(), CollabError> {
    if msg.data.marker_type == MarkerType::Commenting && msg.data.content.is_none() {
        return Err(CollabError::MalformedMessage(
            "commenting markers require `content`".to_string(),
        ));
    }

    let marker = store
        .insert_marker(NewMarker {
            session_id: cs.session_id,
            user: cs.user.clone(),
            section_id: msg.data.section_id.clone(),
            marker_type: msg.data.marker_type,
            position: msg.data.position.clone(),
            content: msg.data.content.clone(),
        })
        .await
        .map_err(|e| CollabError::PersistenceFailure(e.to_string()))?;

    registry
        .broadcast(
            cs.session_id,
            &OutboundMessage::MarkerAdded(MarkerAddedMessage {
                session_id: cs.session_id,
                user: cs.user.clone(),
                marker,
            }),
            None,
        )
        .await;

    Ok(())
}

/// Handle a `marker_remove` message.
///
/// Any joined user may deactivate any marker in the session; the
/// allow-list is the trust boundary, not marker authorship. Removal is
/// idempotent: deactivating an already-inactive or unknown id still
/// broadcasts `marker_removed`, which clients treat as a no-op.
pub async fn handle_marker_remove_message<S: CollabStore + ?Sized>(
    msg: &MarkerRemoveMessage,
    cs: &ClientSession,
    store: &S,
    registry: &SessionRegistry,
) -> Result<(), CollabError> {
    let marker_id = msg.data.marker_id;

    let removed = store
        .deactivate_marker(marker_id)
        .await
        .map_err(|e| CollabError::PersistenceFailure(e.to_string()))?;
    if !removed {
        debug!(
            "marker_remove for {} in session {} matched no active marker",
            marker_id, cs.session_id
        );
    }

    registry
        .broadcast(
            cs.session_id,
            &OutboundMessage::MarkerRemoved(MarkerRemovedMessage {
                session_id: cs.session_id,
                marker_id,
            }),
            None,
        )
        .await;

    Ok(())
}
