use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config;
use crate::db::dbcollab;
use crate::db::store::CollabStore;
use crate::models::{CollabError, InboundMessage, OutboundMessage, PresenceChangeMessage, UserRef, EVENT_LEAVE};
use crate::registry::{send_direct, SessionRegistry};
use crate::websocket::msg_comment_handler::handle_comment_message;
use crate::websocket::msg_join_handler::handle_join_message;
use crate::websocket::msg_marker_handler::{handle_marker_remove_message, handle_marker_update_message};
use crate::websocket::msg_presence_handler::{handle_cursor_move_message, handle_section_view_message};

/// Identity a connection carries once its `join` has been accepted.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub session_id: Uuid,
    pub user: UserRef,
}

/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(registry): State<Arc<SessionRegistry>>,
) -> Response {
    info!("New WebSocket connection attempt");
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

/// Handle one WebSocket connection for its whole lifetime.
///
/// The connection starts unauthenticated; only a successful `join`
/// registers it. The read loop below is the per-connection state
/// machine; the writer task drains a channel so private replies and
/// session broadcasts share one ordered path to the socket.
async fn handle_socket(socket: WebSocket, registry: Arc<SessionRegistry>) {
    // Generate unique connection ID to identify this client
    let conn_id = Uuid::new_v4();
    info!("WebSocket connection established with connection_id: {}", conn_id);

    // Split the socket into sender and receiver
    let (mut sink, mut stream) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let store = dbcollab::get_db();
    let join_window = Duration::from_secs(config::get_config().join_timeout_secs);

    let mut client_session: Option<ClientSession> = None;

    loop {
        // Connections that never complete a join are reaped once the
        // join window elapses.
        let frame = if client_session.is_none() {
            match timeout(join_window, stream.next()).await {
                Ok(frame) => frame,
                Err(_) => {
                    info!(
                        "Connection {} did not join within {}s, closing",
                        conn_id,
                        join_window.as_secs()
                    );
                    break;
                }
            }
        } else {
            stream.next().await
        };

        let Some(Ok(frame)) = frame else { break };
        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Ping/pong are answered by the protocol stack; binary
            // frames are not part of this protocol.
            _ => continue,
        };

        // Parse the incoming message as JSON. A malformed frame gets a
        // private error reply; the connection stays open.
        let inbound: InboundMessage = match serde_json::from_str(&text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!("Failed to parse message on connection {}: {}", conn_id, e);
                reply_error(&tx, &CollabError::MalformedMessage(e.to_string()));
                continue;
            }
        };

        match inbound {
            InboundMessage::Join(join_msg) => {
                if client_session.is_some() {
                    reply_error(&tx, &CollabError::AlreadyJoined);
                    continue;
                }
                let Some(db) = &store else {
                    error!("Database not initialized, rejecting join on connection {}", conn_id);
                    reply_error(&tx, &no_database());
                    continue;
                };
                match handle_join_message(&join_msg, conn_id, db.as_ref(), &registry, &tx).await {
                    Ok(cs) => client_session = Some(cs),
                    Err(e) => {
                        // A rejected join leaves the connection open so the
                        // client may retry with different credentials.
                        info!("Join rejected on connection {}: {}", conn_id, e);
                        reply_error(&tx, &e);
                    }
                }
            }
            InboundMessage::Leave(_) => {
                let Some(cs) = client_session.take() else {
                    reply_error(&tx, &CollabError::NotJoined);
                    continue;
                };
                handle_client_departure(store.as_deref(), &registry, &cs, conn_id, true).await;
            }
            other => {
                let Some(cs) = &client_session else {
                    reply_error(&tx, &CollabError::NotJoined);
                    continue;
                };
                if other.session_id() != cs.session_id {
                    reply_error(&tx, &CollabError::NotJoined);
                    continue;
                }

                let result = match &other {
                    InboundMessage::MarkerUpdate(msg) => match &store {
                        Some(db) => handle_marker_update_message(msg, cs, db.as_ref(), &registry).await,
                        None => Err(no_database()),
                    },
                    InboundMessage::MarkerRemove(msg) => match &store {
                        Some(db) => handle_marker_remove_message(msg, cs, db.as_ref(), &registry).await,
                        None => Err(no_database()),
                    },
                    InboundMessage::Comment(msg) => match &store {
                        Some(db) => handle_comment_message(msg, cs, db.as_ref(), &registry).await,
                        None => Err(no_database()),
                    },
                    InboundMessage::CursorMove(msg) => {
                        handle_cursor_move_message(msg, cs, conn_id, &registry).await;
                        Ok(())
                    }
                    InboundMessage::SectionView(msg) => match &store {
                        Some(db) => {
                            handle_section_view_message(msg, cs, conn_id, db.as_ref(), &registry).await
                        }
                        None => Err(no_database()),
                    },
                    // Join and Leave are handled above
                    InboundMessage::Join(_) | InboundMessage::Leave(_) => unreachable!(),
                };

                if let Err(e) = result {
                    warn!("Message handling failed on connection {}: {}", conn_id, e);
                    reply_error(&tx, &e);
                }
            }
        }
    }

    // Abrupt socket closure and explicit leave share one cleanup path.
    if let Some(cs) = client_session.take() {
        handle_client_departure(store.as_deref(), &registry, &cs, conn_id, false).await;
    }

    write_task.abort();
    info!("WebSocket connection {} terminated", conn_id);
}

/// Run the departure sequence for a joined connection: deactivate the
/// user's markers, append the `leave` event, unregister, and announce
/// `user_left` with the refreshed roster.
///
/// Persistence failures are logged but never block unregistration or
/// the broadcast; the registry mirrors connection liveness, not
/// storage state.
pub async fn handle_client_departure<S: CollabStore + ?Sized>(
    store: Option<&S>,
    registry: &SessionRegistry,
    cs: &ClientSession,
    conn_id: Uuid,
    explicit: bool,
) {
    if let Some(store) = store {
        if let Err(e) = store
            .deactivate_user_markers(cs.session_id, &cs.user.user_id)
            .await
        {
            error!(
                "Failed to deactivate markers of user {} in session {}: {}",
                cs.user.user_id, cs.session_id, e
            );
        }
        if let Err(e) = store
            .append_event(
                cs.session_id,
                &cs.user.user_id,
                EVENT_LEAVE,
                json!({ "userName": cs.user.user_name, "explicit": explicit }),
            )
            .await
        {
            error!(
                "Failed to append leave event for user {} in session {}: {}",
                cs.user.user_id, cs.session_id, e
            );
        }
    }

    registry.unregister(cs.session_id, conn_id).await;
    let active_users = registry.active_users(cs.session_id).await;
    registry
        .broadcast(
            cs.session_id,
            &OutboundMessage::UserLeft(PresenceChangeMessage {
                session_id: cs.session_id,
                user: cs.user.clone(),
                active_users,
            }),
            None,
        )
        .await;

    info!(
        "User {} {} session {} (connection {})",
        cs.user.user_id,
        if explicit { "left" } else { "disconnected from" },
        cs.session_id,
        conn_id
    );
}

fn no_database() -> CollabError {
    CollabError::PersistenceFailure("database not initialized".to_string())
}

fn reply_error(tx: &mpsc::UnboundedSender<Message>, err: &CollabError) {
    send_direct(tx, &OutboundMessage::Error(err.to_error_message()));
}
