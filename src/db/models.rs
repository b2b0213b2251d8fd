use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Durable user identity, stable across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, password_hash: String, name: String, email: String, role: String) -> Self {
        Self {
            id: UserId::new(),
            username,
            password_hash,
            name,
            email,
            role,
            created_at: Utc::now(),
        }
    }
}

/// A single direct message. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: UserId,
    pub recipient: UserId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Stamps a new message with a fresh id and the current server time.
    pub fn new(sender: UserId, recipient: UserId, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            recipient,
            content,
            timestamp: Utc::now(),
        }
    }

    /// True if the message belongs to the conversation between `a` and `b`.
    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        (self.sender == a && self.recipient == b) || (self.sender == b && self.recipient == a)
    }
}

/// One message-like entry inside a saved conversation snapshot.
///
/// Entries are client supplied and are not cross-checked against the
/// per-message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub sender: UserId,
    pub recipient: UserId,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub id: Uuid,
    pub sender: UserId,
    pub recipient: UserId,
    pub messages: Vec<SnapshotEntry>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationSnapshot {
    pub fn new(sender: UserId, recipient: UserId, messages: Vec<SnapshotEntry>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            recipient,
            messages,
            timestamp: Utc::now(),
        }
    }

    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        (self.sender == a && self.recipient == b) || (self.sender == b && self.recipient == a)
    }
}
