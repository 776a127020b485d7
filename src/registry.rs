use std::collections::HashMap;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{OutboundMessage, UserRef};

/// One live connection as seen by the registry: the resolved identity
/// plus the channel feeding its socket writer task.
#[derive(Debug, Clone)]
pub struct ConnectedClient {
    pub conn_id: Uuid,
    pub user: UserRef,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// In-memory map of which connections belong to which collaboration
/// session. The sole source of truth for "who is online right now".
///
/// The registry is the only component allowed to mutate the connection
/// set; it mirrors actual connection liveness, not durable state. All
/// operations on the same session are serialized by the lock, so a
/// broadcast can never observe a half-applied roster.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, HashMap<Uuid, ConnectedClient>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a session. No-op if already present.
    pub async fn register(&self, session_id: Uuid, client: ConnectedClient) {
        let mut sessions = self.sessions.write().await;
        let conns = sessions.entry(session_id).or_default();
        if conns.contains_key(&client.conn_id) {
            return;
        }
        debug!(
            "Registered connection {} (user {}) in session {}",
            client.conn_id, client.user.user_id, session_id
        );
        conns.insert(client.conn_id, client);
    }

    /// Remove a connection; drops the session entry once it is empty.
    /// Returns whether the connection was registered.
    pub async fn unregister(&self, session_id: Uuid, conn_id: Uuid) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(conns) = sessions.get_mut(&session_id) else {
            return false;
        };
        let removed = conns.remove(&conn_id).is_some();
        if conns.is_empty() {
            sessions.remove(&session_id);
            debug!("Session {} has no connections left, dropping registry entry", session_id);
        }
        removed
    }

    /// One presence tuple per registered connection. A user with two
    /// tabs open appears twice; clients collapse duplicates if they
    /// care.
    pub async fn active_users(&self, session_id: Uuid) -> Vec<UserRef> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&session_id)
            .map(|conns| conns.values().map(|c| c.user.clone()).collect())
            .unwrap_or_default()
    }

    /// Deliver an outbound message to every connection in the session,
    /// optionally excluding the originator.
    ///
    /// The message is serialized once. A connection whose channel is
    /// gone (writer task ended, socket dropped) is skipped with a
    /// warning; the remaining connections still receive the message.
    /// Returns the number of successful deliveries.
    pub async fn broadcast(
        &self,
        session_id: Uuid,
        msg: &OutboundMessage,
        exclude: Option<Uuid>,
    ) -> usize {
        let payload = match serde_json::to_string(msg) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize outbound message for session {}: {}", session_id, e);
                return 0;
            }
        };

        let sessions = self.sessions.read().await;
        let Some(conns) = sessions.get(&session_id) else {
            return 0;
        };

        let mut delivered = 0;
        for client in conns.values() {
            if Some(client.conn_id) == exclude {
                continue;
            }
            if client.tx.send(Message::Text(payload.clone())).is_err() {
                // Stale connection; its read loop will unregister it.
                warn!(
                    "Dropping broadcast to stale connection {} in session {}",
                    client.conn_id, session_id
                );
                continue;
            }
            delivered += 1;
        }
        delivered
    }

    /// Number of sessions with at least one live connection.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Total live connections across all sessions.
    pub async fn connection_count(&self) -> usize {
        self.sessions.read().await.values().map(|conns| conns.len()).sum()
    }
}

/// Send a message to a single connection, outside any fanout.
/// Used for private replies (`session_state`, `error`).
pub fn send_direct(tx: &mpsc::UnboundedSender<Message>, msg: &OutboundMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(payload) => tx.send(Message::Text(payload)).is_ok(),
        Err(e) => {
            warn!("Failed to serialize direct message: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorMessage, MarkerRemovedMessage};

    fn user(id: &str) -> UserRef {
        UserRef {
            user_id: id.to_string(),
            user_name: format!("name-{}", id),
            profile_image: None,
        }
    }

    fn client(id: &str) -> (ConnectedClient, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ConnectedClient {
                conn_id: Uuid::new_v4(),
                user: user(id),
                tx,
            },
            rx,
        )
    }

    fn removal(session_id: Uuid) -> OutboundMessage {
        OutboundMessage::MarkerRemoved(MarkerRemovedMessage {
            session_id,
            marker_id: Uuid::new_v4(),
        })
    }

    #[tokio::test]
    async fn register_and_unregister_drops_empty_session() {
        let registry = SessionRegistry::new();
        let session_id = Uuid::new_v4();
        let (a, _rx) = client("u-a");
        let conn_id = a.conn_id;

        registry.register(session_id, a).await;
        assert_eq!(registry.session_count().await, 1);
        assert_eq!(registry.connection_count().await, 1);

        assert!(registry.unregister(session_id, conn_id).await);
        assert_eq!(registry.session_count().await, 0);
        assert!(registry.active_users(session_id).await.is_empty());
    }

    #[tokio::test]
    async fn register_is_idempotent_per_connection() {
        let registry = SessionRegistry::new();
        let session_id = Uuid::new_v4();
        let (a, _rx) = client("u-a");

        registry.register(session_id, a.clone()).await;
        registry.register(session_id, a).await;
        assert_eq!(registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn active_users_lists_one_entry_per_connection() {
        let registry = SessionRegistry::new();
        let session_id = Uuid::new_v4();
        let (a1, _rx1) = client("u-a");
        let (mut a2, _rx2) = client("u-a");
        a2.user = a1.user.clone(); // same user, second tab

        registry.register(session_id, a1).await;
        registry.register(session_id, a2).await;

        let users = registry.active_users(session_id).await;
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u.user_id == "u-a"));
    }

    #[tokio::test]
    async fn broadcast_excludes_the_originator() {
        let registry = SessionRegistry::new();
        let session_id = Uuid::new_v4();
        let (a, mut rx_a) = client("u-a");
        let (b, mut rx_b) = client("u-b");
        let a_conn = a.conn_id;

        registry.register(session_id, a).await;
        registry.register(session_id, b).await;

        let delivered = registry.broadcast(session_id, &removal(session_id), Some(a_conn)).await;
        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn broadcast_survives_a_stale_connection() {
        let registry = SessionRegistry::new();
        let session_id = Uuid::new_v4();
        let (a, rx_a) = client("u-a");
        let (b, mut rx_b) = client("u-b");

        registry.register(session_id, a).await;
        registry.register(session_id, b).await;

        // Simulate an abruptly dropped socket: the writer side is gone.
        drop(rx_a);

        let delivered = registry.broadcast(session_id, &removal(session_id), None).await;
        assert_eq!(delivered, 1);
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn broadcast_to_unknown_session_delivers_nothing() {
        let registry = SessionRegistry::new();
        let session_id = Uuid::new_v4();
        assert_eq!(registry.broadcast(session_id, &removal(session_id), None).await, 0);
    }

    #[tokio::test]
    async fn broadcasts_preserve_send_order_per_connection() {
        let registry = SessionRegistry::new();
        let session_id = Uuid::new_v4();
        let (a, mut rx_a) = client("u-a");
        registry.register(session_id, a).await;

        let first = OutboundMessage::Error(ErrorMessage {
            code: "one".to_string(),
            message: String::new(),
        });
        let second = OutboundMessage::Error(ErrorMessage {
            code: "two".to_string(),
            message: String::new(),
        });
        registry.broadcast(session_id, &first, None).await;
        registry.broadcast(session_id, &second, None).await;

        let take = |msg: Message| match msg {
            Message::Text(text) => text,
            other => panic!("expected text frame, got {:?}", other),
        };
        assert!(take(rx_a.try_recv().unwrap()).contains("\"one\""));
        assert!(take(rx_a.try_recv().unwrap()).contains("\"two\""));
    }
}
