use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::ChatConfig;
use crate::db::{MessageStore, UserDirectory, UserId};
use crate::delivery::{DeliveryReport, DeliveryRouter};
use crate::error::ChatError;
use crate::presence::{OnlineSet, PresenceBroadcaster, PresenceRegistry};
use crate::websocket::{
    ClientMessage, ConnectionHandle, ConnectionPool, ConnectionState, OutboundSender, ServerMessage,
    SubmitMessage,
};

/// Result of handling one inbound event for a connection.
#[derive(Debug)]
pub struct Dispatch {
    pub state: ConnectionState,
    /// Direct answer for the connection that sent the event.
    pub reply: Option<ServerMessage>,
}

/// The messaging core: presence registry, broadcaster and router behind the
/// four transport events (connect, identify, submit, disconnect).
pub struct ChatServer {
    pool: Arc<ConnectionPool>,
    registry: Arc<PresenceRegistry>,
    broadcaster: PresenceBroadcaster,
    router: DeliveryRouter,
    // Held across "mutate registry + publish" so broadcasts go out in the
    // same order as the mutations they describe.
    presence_gate: Mutex<()>,
    max_message_length: usize,
}

impl ChatServer {
    pub fn new(
        store: Arc<dyn MessageStore>,
        directory: Arc<dyn UserDirectory>,
        config: &ChatConfig,
    ) -> Self {
        let pool = Arc::new(ConnectionPool::new());
        let registry = Arc::new(PresenceRegistry::new());

        Self {
            broadcaster: PresenceBroadcaster::new(registry.clone(), pool.clone()),
            router: DeliveryRouter::new(store, directory, registry.clone(), pool.clone()),
            pool,
            registry,
            presence_gate: Mutex::new(()),
            max_message_length: config.max_message_length,
        }
    }

    /// Transport opened a connection. It starts `Unidentified` and gets the
    /// current online set straight away.
    pub async fn connect(&self, handle: ConnectionHandle, sender: OutboundSender) -> ConnectionState {
        let _gate = self.presence_gate.lock().await;
        let online = self.registry.snapshot().await;
        if sender.send(PresenceBroadcaster::message_for(&online)).is_err() {
            warn!("Connection {} closed before it was registered", handle);
        }
        self.pool.add(handle, sender).await;
        ConnectionState::Unidentified
    }

    pub async fn dispatch(
        &self,
        handle: ConnectionHandle,
        state: ConnectionState,
        event: ClientMessage,
    ) -> Dispatch {
        let outcome = match event {
            ClientMessage::Identify(user) => self.identify(handle, state, user).await.map(|state| Dispatch {
                state,
                reply: None,
            }),
            ClientMessage::SubmitMessage(submission) => self.submit(state, submission).await.map(|_| Dispatch {
                state,
                reply: None,
            }),
            ClientMessage::Ping => Ok(Dispatch {
                state,
                reply: Some(ServerMessage::Pong),
            }),
        };

        outcome.unwrap_or_else(|e| {
            warn!("Rejected event on connection {}: {}", handle, e);
            Dispatch {
                state,
                reply: Some(ServerMessage::from(&e)),
            }
        })
    }

    pub async fn identify(
        &self,
        handle: ConnectionHandle,
        state: ConnectionState,
        user: UserId,
    ) -> Result<ConnectionState, ChatError> {
        let next = state.identify(user)?;

        let _gate = self.presence_gate.lock().await;
        self.registry.register(user, handle).await;
        info!("User {} identified on connection {}", user, handle);
        self.broadcaster.on_registry_change().await;

        Ok(next)
    }

    pub async fn submit(
        &self,
        state: ConnectionState,
        submission: SubmitMessage,
    ) -> Result<DeliveryReport, ChatError> {
        state.authorize_sender(submission.sender)?;

        if submission.content.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong { limit: self.max_message_length });
        }

        self.router.deliver(submission).await
    }

    /// Transport reported the connection gone. Always moves it to `Closed`.
    pub async fn disconnect(&self, handle: ConnectionHandle) -> ConnectionState {
        self.pool.remove(&handle).await;

        let _gate = self.presence_gate.lock().await;
        if let Some(user) = self.registry.unregister_by_connection(handle).await {
            info!("User {} went offline (connection {})", user, handle);
            self.broadcaster.on_registry_change().await;
        }

        ConnectionState::Closed
    }

    pub async fn online_users(&self) -> OnlineSet {
        self.registry.snapshot().await
    }

    pub async fn connection_count(&self) -> usize {
        self.pool.connection_count().await
    }

    pub fn registry(&self) -> Arc<PresenceRegistry> {
        self.registry.clone()
    }
}
