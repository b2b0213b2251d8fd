use std::collections::{BTreeSet, HashMap};
use tokio::sync::Mutex;
use tracing::debug;

use crate::db::UserId;
use crate::websocket::ConnectionHandle;

/// Identities currently online. Connection handles never leave the registry
/// through this type.
pub type OnlineSet = BTreeSet<UserId>;

#[derive(Debug, Default)]
struct Entries {
    by_user: HashMap<UserId, ConnectionHandle>,
    by_connection: HashMap<ConnectionHandle, UserId>,
}

/// Maps each online user to the one live connection that currently speaks
/// for them.
///
/// Both directions are kept in lockstep under a single mutex, so a user has
/// at most one connection and a connection belongs to at most one user.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: Mutex<Entries>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `user` to `connection`, replacing whatever either side was bound
    /// to before. Last writer wins.
    pub async fn register(&self, user: UserId, connection: ConnectionHandle) {
        let mut entries = self.entries.lock().await;

        if let Some(previous) = entries.by_user.insert(user, connection) {
            if previous != connection {
                entries.by_connection.remove(&previous);
                debug!(%user, %previous, %connection, "presence entry replaced");
            }
        }

        if let Some(other) = entries.by_connection.insert(connection, user) {
            if other != user {
                entries.by_user.remove(&other);
            }
        }
    }

    /// Removes the entry that still points at `connection`, if any.
    ///
    /// A disconnect for a connection that was already superseded by a newer
    /// `register` finds nothing here and leaves the newer session intact.
    pub async fn unregister_by_connection(&self, connection: ConnectionHandle) -> Option<UserId> {
        let mut entries = self.entries.lock().await;

        let user = entries.by_connection.remove(&connection)?;
        if entries.by_user.get(&user) == Some(&connection) {
            entries.by_user.remove(&user);
        }
        Some(user)
    }

    pub async fn lookup(&self, user: UserId) -> Option<ConnectionHandle> {
        self.entries.lock().await.by_user.get(&user).copied()
    }

    pub async fn snapshot(&self) -> OnlineSet {
        self.entries.lock().await.by_user.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.by_user.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = PresenceRegistry::new();
        let alice = UserId::new();
        let c1 = ConnectionHandle::new();

        assert_eq!(registry.lookup(alice).await, None);
        registry.register(alice, c1).await;
        assert_eq!(registry.lookup(alice).await, Some(c1));

        // Repeating the identical call changes nothing.
        registry.register(alice, c1).await;
        assert_eq!(registry.lookup(alice).await, Some(c1));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_reconnect_overwrites_previous_connection() {
        let registry = PresenceRegistry::new();
        let alice = UserId::new();
        let c1 = ConnectionHandle::new();
        let c2 = ConnectionHandle::new();

        registry.register(alice, c1).await;
        registry.register(alice, c2).await;

        assert_eq!(registry.lookup(alice).await, Some(c2));
        assert_eq!(registry.snapshot().await, OnlineSet::from([alice]));
    }

    #[tokio::test]
    async fn test_stale_disconnect_keeps_newer_session() {
        let registry = PresenceRegistry::new();
        let alice = UserId::new();
        let c1 = ConnectionHandle::new();
        let c2 = ConnectionHandle::new();

        registry.register(alice, c1).await;
        registry.register(alice, c2).await;

        assert_eq!(registry.unregister_by_connection(c1).await, None);
        assert_eq!(registry.lookup(alice).await, Some(c2));

        assert_eq!(registry.unregister_by_connection(c2).await, Some(alice));
        assert_eq!(registry.lookup(alice).await, None);
    }

    #[tokio::test]
    async fn test_unregister_unknown_connection_is_noop() {
        let registry = PresenceRegistry::new();
        let alice = UserId::new();
        let c1 = ConnectionHandle::new();
        registry.register(alice, c1).await;

        assert_eq!(registry.unregister_by_connection(ConnectionHandle::new()).await, None);
        assert_eq!(registry.unregister_by_connection(c1).await, Some(alice));
        assert_eq!(registry.unregister_by_connection(c1).await, None);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_connection_belongs_to_one_user() {
        let registry = PresenceRegistry::new();
        let alice = UserId::new();
        let bob = UserId::new();
        let c1 = ConnectionHandle::new();

        registry.register(alice, c1).await;
        registry.register(bob, c1).await;

        assert_eq!(registry.lookup(alice).await, None);
        assert_eq!(registry.lookup(bob).await, Some(c1));
        assert_eq!(registry.snapshot().await, OnlineSet::from([bob]));
    }

    #[tokio::test]
    async fn test_snapshot_tracks_exact_key_set() {
        let registry = PresenceRegistry::new();
        let users: Vec<UserId> = (0..5).map(|_| UserId::new()).collect();
        let conns: Vec<ConnectionHandle> = (0..5).map(|_| ConnectionHandle::new()).collect();

        for (user, conn) in users.iter().zip(&conns) {
            registry.register(*user, *conn).await;
        }
        registry.unregister_by_connection(conns[1]).await;
        registry.unregister_by_connection(conns[3]).await;

        let expected: OnlineSet = [users[0], users[2], users[4]].into_iter().collect();
        assert_eq!(registry.snapshot().await, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reconnects_converge() {
        let registry = Arc::new(PresenceRegistry::new());
        let alice = UserId::new();
        let mut tasks = Vec::new();

        for _ in 0..32 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let conn = ConnectionHandle::new();
                registry.register(alice, conn).await;
                registry.unregister_by_connection(conn).await;
                conn
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // Every session registered and then left again.
        assert!(registry.is_empty().await);
        assert_eq!(registry.lookup(alice).await, None);
    }

    #[derive(Debug, Clone)]
    enum PresenceOp {
        Register { user: usize, connection: usize },
        Unregister { connection: usize },
    }

    // Small index pools so reconnects, stale disconnects and reused handles
    // all show up in short sequences.
    fn arb_op() -> impl Strategy<Value = PresenceOp> {
        prop_oneof![
            3 => (0usize..4, 0usize..6)
                .prop_map(|(user, connection)| PresenceOp::Register { user, connection }),
            2 => (0usize..6).prop_map(|connection| PresenceOp::Unregister { connection }),
        ]
    }

    proptest! {
        /// After any sequence, each user maps to the connection of their most
        /// recent register that no later unregister of that connection undid,
        /// and the snapshot is exactly the set of such users.
        #[test]
        fn prop_registry_matches_last_writer_model(ops in prop::collection::vec(arb_op(), 0..40)) {
            let users: Vec<UserId> = (0..4).map(|_| UserId::new()).collect();
            let conns: Vec<ConnectionHandle> = (0..6).map(|_| ConnectionHandle::new()).collect();
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

            runtime.block_on(async {
                let registry = PresenceRegistry::new();
                let mut model: HashMap<usize, usize> = HashMap::new();

                for op in &ops {
                    match *op {
                        PresenceOp::Register { user, connection } => {
                            registry.register(users[user], conns[connection]).await;
                            model.retain(|_, c| *c != connection);
                            model.insert(user, connection);
                        }
                        PresenceOp::Unregister { connection } => {
                            let removed = registry.unregister_by_connection(conns[connection]).await;
                            let expected = model.iter().find(|(_, c)| **c == connection).map(|(u, _)| *u);
                            prop_assert_eq!(removed, expected.map(|u| users[u]));
                            model.retain(|_, c| *c != connection);
                        }
                    }

                    for (index, user) in users.iter().enumerate() {
                        prop_assert_eq!(
                            registry.lookup(*user).await,
                            model.get(&index).map(|c| conns[*c])
                        );
                    }
                    let expected: OnlineSet = model.keys().map(|u| users[*u]).collect();
                    prop_assert_eq!(registry.snapshot().await, expected);
                }
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
