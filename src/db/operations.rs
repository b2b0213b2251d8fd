use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::db::models::{ChatMessage, ConversationSnapshot, SnapshotEntry, User, UserId};
use crate::db::{MessageStore, UserDirectory};
use crate::Result;

/// Postgres-backed store for users, messages and conversation snapshots.
#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }
}

#[derive(FromRow)]
struct SnapshotRow {
    id: Uuid,
    sender: UserId,
    recipient: UserId,
    messages: Json<Vec<SnapshotEntry>>,
    created_at: DateTime<Utc>,
}

impl From<SnapshotRow> for ConversationSnapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            id: row.id,
            sender: row.sender,
            recipient: row.recipient,
            messages: row.messages.0,
            timestamp: row.created_at,
        }
    }
}

#[async_trait]
impl MessageStore for DbOperations {
    async fn append(&self, message: &ChatMessage) -> Result<ChatMessage> {
        let stored = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO messages (id, sender, recipient, content, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, sender, recipient, content, timestamp
            "#,
        )
        .bind(message.id)
        .bind(message.sender)
        .bind(message.recipient)
        .bind(&message.content)
        .bind(message.timestamp)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(stored)
    }

    async fn query(&self, a: UserId, b: UserId) -> Result<Vec<ChatMessage>> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, sender, recipient, content, timestamp
            FROM messages
            WHERE (sender = $1 AND recipient = $2) OR (sender = $2 AND recipient = $1)
            ORDER BY timestamp ASC, seq ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(messages)
    }

    async fn save_snapshot(&self, snapshot: &ConversationSnapshot) -> Result<ConversationSnapshot> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            INSERT INTO conversation_snapshots (id, sender, recipient, messages, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, sender, recipient, messages, created_at
            "#,
        )
        .bind(snapshot.id)
        .bind(snapshot.sender)
        .bind(snapshot.recipient)
        .bind(Json(&snapshot.messages))
        .bind(snapshot.timestamp)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn load_snapshots(&self, a: UserId, b: UserId) -> Result<Vec<ConversationSnapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, sender, recipient, messages, created_at
            FROM conversation_snapshots
            WHERE (sender = $1 AND recipient = $2) OR (sender = $2 AND recipient = $1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(ConversationSnapshot::from).collect())
    }
}

const USER_COLUMNS: &str = "id, username, password_hash, name, email, role, created_at";

#[async_trait]
impl UserDirectory for DbOperations {
    async fn resolve(&self, id: UserId) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"))
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(users)
    }

    async fn create_user(&self, user: &User) -> Result<User> {
        let mut transaction = self.pool.begin().await?;

        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.role)
        .bind(user.created_at)
        .fetch_one(&mut *transaction)
        .await;

        match created {
            Ok(user) => {
                transaction.commit().await?;
                Ok(user)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }
}
