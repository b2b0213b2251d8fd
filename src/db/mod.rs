//! Persistence layer for the relay.
//!
//! `MessageStore` and `UserDirectory` are the seams the messaging core talks
//! to. `DbOperations` backs them with Postgres, `MemoryStore` keeps everything
//! in process for tests and single-node demos.

pub mod memory;
pub mod models;
pub mod operations;

use async_trait::async_trait;

use crate::Result;

pub use memory::MemoryStore;
pub use models::{ChatMessage, ConversationSnapshot, SnapshotEntry, User, UserId};
pub use operations::DbOperations;

/// Durable log of individual messages plus explicitly saved snapshots.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends one message and returns the record as stored.
    async fn append(&self, message: &ChatMessage) -> Result<ChatMessage>;

    /// All messages exchanged between `a` and `b`, either direction,
    /// oldest first.
    async fn query(&self, a: UserId, b: UserId) -> Result<Vec<ChatMessage>>;

    async fn save_snapshot(&self, snapshot: &ConversationSnapshot) -> Result<ConversationSnapshot>;

    /// Snapshots saved for the pair in either direction, oldest first.
    async fn load_snapshots(&self, a: UserId, b: UserId) -> Result<Vec<ConversationSnapshot>>;
}

/// Read access to registered users. The messaging core only calls `resolve`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve(&self, id: UserId) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn list_users(&self) -> Result<Vec<User>>;

    async fn create_user(&self, user: &User) -> Result<User>;
}
