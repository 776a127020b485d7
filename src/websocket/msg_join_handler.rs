use axum::extract::ws::Message;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::db::store::CollabStore;
use crate::models::{
    CollabError, JoinMessage, OutboundMessage, PresenceChangeMessage, SessionStateMessage,
    EVENT_JOIN,
};
use crate::registry::{send_direct, ConnectedClient, SessionRegistry};
use crate::websocket::handler::ClientSession;
use crate::ws::sessionctx;

/// Handle a `join` message.
///
/// Authorizes the user against the session record, registers the
/// connection, appends the audit event, announces the newcomer to the
/// rest of the session and replays the full current state privately to
/// the joining connection. Late joiners must never see a blank canvas.
pub async fn handle_join_message<S: CollabStore + ?Sized>(
    msg: &JoinMessage,
    conn_id: Uuid,
    store: &S,
    registry: &SessionRegistry,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<ClientSession, CollabError> {
    let session_id = msg.session_id;
    let user = &msg.user;

    // 1. Look up the session record
    let session = sessionctx::get_or_load_session(store, session_id)
        .await
        .map_err(|e| CollabError::PersistenceFailure(e.to_string()))?;
    let session = match session {
        Some(session) if session.is_active => session,
        _ => return Err(CollabError::SessionNotFound(session_id)),
    };

    // 2. Authorize: owner, allow-list member, or open session
    if !session.permits(&user.user_id) {
        return Err(CollabError::Unauthorized);
    }

    // 3. Record the join before any in-memory side effect, so a failed
    //    write leaves nothing to roll back
    store
        .append_event(
            session_id,
            &user.user_id,
            EVENT_JOIN,
            json!({ "userName": user.user_name }),
        )
        .await
        .map_err(|e| CollabError::PersistenceFailure(e.to_string()))?;

    // 4. Snapshot the markers to replay
    let markers = store
        .active_markers(session_id)
        .await
        .map_err(|e| CollabError::PersistenceFailure(e.to_string()))?;

    // 5. Register the connection and take the refreshed roster
    registry
        .register(
            session_id,
            ConnectedClient {
                conn_id,
                user: user.clone(),
                tx: tx.clone(),
            },
        )
        .await;
    let active_users = registry.active_users(session_id).await;

    // 6. Announce to everyone already in the session
    registry
        .broadcast(
            session_id,
            &OutboundMessage::UserJoined(PresenceChangeMessage {
                session_id,
                user: user.clone(),
                active_users: active_users.clone(),
            }),
            Some(conn_id),
        )
        .await;

    // 7. Private full-state replay for the newcomer
    send_direct(
        tx,
        &OutboundMessage::SessionState(SessionStateMessage {
            session_id,
            markers,
            active_users,
        }),
    );

    info!(
        "User {} joined session {} on connection {}",
        user.user_id, session_id, conn_id
    );

    Ok(ClientSession {
        session_id,
        user: user.clone(),
    })
}
