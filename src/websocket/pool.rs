use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use crate::error::ChatError;
use crate::websocket::{ConnectionHandle, ServerMessage};

pub type OutboundSender = mpsc::UnboundedSender<ServerMessage>;

/// Every open connection, identified or not, with the channel that feeds
/// its socket.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    connections: Arc<RwLock<HashMap<ConnectionHandle, OutboundSender>>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, id: ConnectionHandle, sender: OutboundSender) {
        self.connections.write().await.insert(id, sender);
        info!("Added connection {} to pool", id);
    }

    pub async fn remove(&self, id: &ConnectionHandle) -> bool {
        let removed = self.connections.write().await.remove(id).is_some();
        if removed {
            info!("Removed connection {} from pool", id);
        }
        removed
    }

    /// Sends `msg` to every connection; returns how many accepted it.
    pub async fn broadcast(&self, msg: &ServerMessage) -> usize {
        let connections = self.connections.read().await;
        let mut reached = 0;

        for (id, sender) in connections.iter() {
            match sender.send(msg.clone()) {
                Ok(()) => reached += 1,
                Err(e) => warn!("Failed to broadcast to connection {}: {}", id, e),
            }
        }

        reached
    }

    pub async fn send_to(&self, id: &ConnectionHandle, msg: ServerMessage) -> Result<(), ChatError> {
        match self.connections.read().await.get(id) {
            Some(sender) => sender
                .send(msg)
                .map_err(|e| ChatError::DeliveryFailure(format!("connection {}: {}", id, e))),
            None => Err(ChatError::DeliveryFailure(format!("connection {} not found", id))),
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}
