//! Routing of direct messages to live connections.

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::db::{ChatMessage, MessageStore, UserDirectory, UserId};
use crate::error::ChatError;
use crate::presence::PresenceRegistry;
use crate::websocket::{ConnectionHandle, ConnectionPool, ServerMessage, SubmitMessage};

/// Outcome of a successful `deliver`.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub message: ChatMessage,
    /// Connections that accepted the `messageReceived` event.
    pub delivered_to: Vec<ConnectionHandle>,
}

impl DeliveryReport {
    pub fn reached(&self, connection: ConnectionHandle) -> bool {
        self.delivered_to.contains(&connection)
    }
}

/// Persists each submitted message, then pushes it to whichever of the
/// sender and recipient are online.
pub struct DeliveryRouter {
    store: Arc<dyn MessageStore>,
    directory: Arc<dyn UserDirectory>,
    registry: Arc<PresenceRegistry>,
    pool: Arc<ConnectionPool>,
}

impl DeliveryRouter {
    pub fn new(
        store: Arc<dyn MessageStore>,
        directory: Arc<dyn UserDirectory>,
        registry: Arc<PresenceRegistry>,
        pool: Arc<ConnectionPool>,
    ) -> Self {
        Self { store, directory, registry, pool }
    }

    /// Persist first, deliver second.
    ///
    /// Only validation and persistence errors are returned; a failed send to
    /// one connection is logged and the other party is still attempted.
    pub async fn deliver(&self, submission: SubmitMessage) -> Result<DeliveryReport, ChatError> {
        self.ensure_known(submission.sender).await?;
        self.ensure_known(submission.recipient).await?;

        let message = ChatMessage::new(submission.sender, submission.recipient, submission.content);
        let message = self.store.append(&message).await.map_err(|e| {
            error!(id = %message.id, "Failed to persist message: {}", e);
            ChatError::PersistenceFailure(e.to_string())
        })?;

        let mut parties = vec![message.sender];
        if message.recipient != message.sender {
            parties.push(message.recipient);
        }

        let mut delivered_to = Vec::with_capacity(parties.len());
        for user in parties {
            let Some(connection) = self.registry.lookup(user).await else {
                debug!(%user, id = %message.id, "user offline, message kept for history");
                continue;
            };

            match self
                .pool
                .send_to(&connection, ServerMessage::MessageReceived(message.clone()))
                .await
            {
                Ok(()) => delivered_to.push(connection),
                Err(e) => warn!(%user, %connection, "Dropping live delivery: {}", e),
            }
        }

        debug!(id = %message.id, delivered = delivered_to.len(), "message routed");
        Ok(DeliveryReport { message, delivered_to })
    }

    async fn ensure_known(&self, user: UserId) -> Result<(), ChatError> {
        match self.directory.resolve(user).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(ChatError::UnknownUser(user)),
            Err(e) => Err(ChatError::DirectoryUnavailable(e.to_string())),
        }
    }
}
