use std::sync::Arc;
use tracing::debug;

use crate::presence::{OnlineSet, PresenceRegistry};
use crate::websocket::{ConnectionPool, ServerMessage};

/// Publishes the full online set to every open connection.
///
/// Each call sends a complete replacement set, never a diff, and nothing is
/// batched: callers invoke it right after every registry mutation.
pub struct PresenceBroadcaster {
    registry: Arc<PresenceRegistry>,
    pool: Arc<ConnectionPool>,
}

impl PresenceBroadcaster {
    pub fn new(registry: Arc<PresenceRegistry>, pool: Arc<ConnectionPool>) -> Self {
        Self { registry, pool }
    }

    pub async fn on_registry_change(&self) -> OnlineSet {
        let online = self.registry.snapshot().await;
        let reached = self.pool.broadcast(&Self::message_for(&online)).await;
        debug!(online = online.len(), reached, "published online users");
        online
    }

    pub fn message_for(online: &OnlineSet) -> ServerMessage {
        ServerMessage::OnlineUsers(online.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UserId;
    use crate::websocket::ConnectionHandle;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_broadcast_reaches_every_connection() {
        let registry = Arc::new(PresenceRegistry::new());
        let pool = Arc::new(ConnectionPool::new());
        let broadcaster = PresenceBroadcaster::new(registry.clone(), pool.clone());

        let alice = UserId::new();
        let c1 = ConnectionHandle::new();
        let c2 = ConnectionHandle::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        pool.add(c1, tx1).await;
        // c2 never identifies but still sees presence changes.
        pool.add(c2, tx2).await;

        registry.register(alice, c1).await;
        let online = broadcaster.on_registry_change().await;
        assert_eq!(online, OnlineSet::from([alice]));

        for rx in [&mut rx1, &mut rx2] {
            match rx.try_recv() {
                Ok(ServerMessage::OnlineUsers(users)) => assert_eq!(users, vec![alice]),
                other => panic!("expected onlineUsers, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_each_change_publishes_full_set() {
        let registry = Arc::new(PresenceRegistry::new());
        let pool = Arc::new(ConnectionPool::new());
        let broadcaster = PresenceBroadcaster::new(registry.clone(), pool.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let observer = ConnectionHandle::new();
        pool.add(observer, tx).await;

        let alice = UserId::new();
        let bob = UserId::new();
        let (ca, cb) = (ConnectionHandle::new(), ConnectionHandle::new());

        registry.register(alice, ca).await;
        broadcaster.on_registry_change().await;
        registry.register(bob, cb).await;
        broadcaster.on_registry_change().await;
        registry.unregister_by_connection(ca).await;
        broadcaster.on_registry_change().await;

        let mut published = Vec::new();
        while let Ok(ServerMessage::OnlineUsers(users)) = rx.try_recv() {
            published.push(users.into_iter().collect::<OnlineSet>());
        }
        assert_eq!(
            published,
            vec![
                OnlineSet::from([alice]),
                OnlineSet::from([alice, bob]),
                OnlineSet::from([bob]),
            ]
        );
    }
}
