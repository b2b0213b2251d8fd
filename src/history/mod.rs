//! Stateless history endpoints over the message store.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::db::{ConversationSnapshot, SnapshotEntry, UserId};
use crate::error::DatabaseError;
use crate::{AppState, Result};

/// `?sender=<uuid>&recipient=<uuid>`; the pair is matched in both directions.
#[derive(Debug, Deserialize)]
pub struct PairQuery {
    pub sender: UserId,
    pub recipient: UserId,
}

#[derive(Debug, Deserialize)]
pub struct SaveHistoryRequest {
    pub sender: UserId,
    pub recipient: UserId,
    #[serde(default)]
    pub messages: Vec<SnapshotEntry>,
}

/// Response shape shared by `/chatHistory` and `/chatHistory/latest`.
#[derive(Debug, Serialize)]
pub struct SnapshotBody {
    pub messages: Vec<SnapshotEntry>,
}

impl From<ConversationSnapshot> for SnapshotBody {
    fn from(snapshot: ConversationSnapshot) -> Self {
        Self { messages: snapshot.messages }
    }
}

pub async fn get_messages(
    query: web::Query<PairQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let messages = state
        .messages
        .query(query.sender, query.recipient)
        .await
        .map_err(|e| {
            error!("Error fetching messages: {}", e);
            e
        })?;

    Ok(HttpResponse::Ok().json(messages))
}

pub async fn get_chat_history(
    query: web::Query<PairQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let snapshots = state
        .messages
        .load_snapshots(query.sender, query.recipient)
        .await
        .map_err(|e| {
            error!("Error fetching chat history: {}", e);
            e
        })?;

    let body: Vec<SnapshotBody> = snapshots.into_iter().map(SnapshotBody::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

pub async fn get_latest_chat_history(
    query: web::Query<PairQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let latest = state
        .messages
        .load_snapshots(query.sender, query.recipient)
        .await?
        .pop()
        .ok_or(DatabaseError::NotFound)?;

    Ok(HttpResponse::Ok().json(SnapshotBody::from(latest)))
}

pub async fn save_chat_history(
    req: web::Json<SaveHistoryRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    let snapshot = ConversationSnapshot::new(req.sender, req.recipient, req.messages);

    state.messages.save_snapshot(&snapshot).await.map_err(|e| {
        error!("Error saving chat history: {}", e);
        e
    })?;

    info!(
        "Saved chat history {} ({} entries) for {} and {}",
        snapshot.id,
        snapshot.messages.len(),
        snapshot.sender,
        snapshot.recipient
    );
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Chat history saved successfully"
    })))
}
