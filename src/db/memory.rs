use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{ChatMessage, ConversationSnapshot, User, UserId};
use crate::db::{MessageStore, UserDirectory};
use crate::error::DatabaseError;
use crate::Result;

#[derive(Debug, Default)]
struct MessageLog {
    entries: Vec<ChatMessage>,
    ids: HashSet<Uuid>,
}

/// In-process store. Records live as long as the process does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: RwLock<MessageLog>,
    snapshots: RwLock<Vec<ConversationSnapshot>>,
    users: RwLock<Vec<User>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn message_count(&self) -> usize {
        self.messages.read().await.entries.len()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: &ChatMessage) -> Result<ChatMessage> {
        let mut log = self.messages.write().await;
        if !log.ids.insert(message.id) {
            return Err(DatabaseError::Duplicate.into());
        }
        log.entries.push(message.clone());
        Ok(message.clone())
    }

    async fn query(&self, a: UserId, b: UserId) -> Result<Vec<ChatMessage>> {
        let mut found: Vec<ChatMessage> = self
            .messages
            .read()
            .await
            .entries
            .iter()
            .filter(|m| m.is_between(a, b))
            .cloned()
            .collect();
        // Stable sort keeps append order for equal timestamps.
        found.sort_by_key(|m| m.timestamp);
        Ok(found)
    }

    async fn save_snapshot(&self, snapshot: &ConversationSnapshot) -> Result<ConversationSnapshot> {
        self.snapshots.write().await.push(snapshot.clone());
        Ok(snapshot.clone())
    }

    async fn load_snapshots(&self, a: UserId, b: UserId) -> Result<Vec<ConversationSnapshot>> {
        let mut found: Vec<ConversationSnapshot> = self
            .snapshots
            .read()
            .await
            .iter()
            .filter(|s| s.is_between(a, b))
            .cloned()
            .collect();
        found.sort_by_key(|s| s.timestamp);
        Ok(found)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn resolve(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.users.read().await.clone())
    }

    async fn create_user(&self, user: &User) -> Result<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == user.username || u.id == user.id) {
            return Err(DatabaseError::Duplicate.into());
        }
        users.push(user.clone());
        Ok(user.clone())
    }
}
