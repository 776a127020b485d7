use uuid::Uuid;

use crate::db::store::CollabStore;
use crate::models::{
    CollabError, CursorMoveBroadcast, CursorMoveMessage, MarkerType, NewMarker, OutboundMessage,
    SectionViewMessage, SectionViewedMessage,
};
use crate::registry::SessionRegistry;
use crate::websocket::handler::ClientSession;

/// Handle a `cursor_move` message.
///
/// The one message type with no durability at all: relayed straight to
/// the other connections for minimal-latency cursor rendering. The
/// sender is excluded; it already knows where its own cursor is.
pub async fn handle_cursor_move_message(
    msg: &CursorMoveMessage,
    cs: &ClientSession,
    conn_id: Uuid,
    registry: &SessionRegistry,
) {
    registry
        .broadcast(
            cs.session_id,
            &OutboundMessage::CursorMove(CursorMoveBroadcast {
                session_id: cs.session_id,
                user: cs.user.clone(),
                section_id: msg.data.section_id.clone(),
                position: msg.data.position.clone(),
            }),
            Some(conn_id),
        )
        .await;
}

/// Handle a `section_view` message: persist a short-lived `viewing`
/// marker (replacing the user's previous one for the same section) and
/// tell the other connections. Clients treat repeated `section_viewed`
/// events for the same (user, section) as a refresh, not an
/// accumulation.
pub async fn handle_section_view_message<S: CollabStore + ?Sized>(
    msg: &SectionViewMessage,
    cs: &ClientSession,
    conn_id: Uuid,
    store: &S,
    registry: &SessionRegistry,
) -> Result<(), CollabError> {
    let marker = store
        .insert_marker(NewMarker {
            session_id: cs.session_id,
            user: cs.user.clone(),
            section_id: msg.data.section_id.clone(),
            marker_type: MarkerType::Viewing,
            position: msg.data.position.clone(),
            content: None,
        })
        .await
        .map_err(|e| CollabError::PersistenceFailure(e.to_string()))?;

    registry
        .broadcast(
            cs.session_id,
            &OutboundMessage::SectionViewed(SectionViewedMessage {
                session_id: cs.session_id,
                user: cs.user.clone(),
                section_id: marker.section_id.clone(),
                marker,
            }),
            Some(conn_id),
        )
        .await;

    Ok(())
}
