use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::db::{ChatMessage, UserId};
use crate::error::ChatError;

/// Identifies one live transport connection. Fresh for every connect, so a
/// reconnecting client never gets its old handle back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(Uuid);

impl ConnectionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitMessage {
    pub sender: UserId,
    pub recipient: UserId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    #[serde(rename = "identify", alias = "userConnected")]
    Identify(UserId),
    #[serde(rename = "submitMessage", alias = "sendMessage")]
    SubmitMessage(SubmitMessage),
    #[serde(rename = "ping")]
    Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    #[serde(rename = "onlineUsers")]
    OnlineUsers(Vec<UserId>),
    #[serde(rename = "messageReceived")]
    MessageReceived(ChatMessage),
    #[serde(rename = "error")]
    Error { code: String, message: String },
    #[serde(rename = "pong")]
    Pong,
}

impl From<&ChatError> for ServerMessage {
    fn from(err: &ChatError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Lifecycle of a single connection.
///
/// `Unidentified -> Identified -> Closed`, or straight to `Closed`. A
/// connection binds to one user for its whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Unidentified,
    Identified(UserId),
    Closed,
}

impl ConnectionState {
    pub fn identify(self, user: UserId) -> Result<ConnectionState, ChatError> {
        match self {
            ConnectionState::Unidentified => Ok(ConnectionState::Identified(user)),
            ConnectionState::Identified(_) => Err(ChatError::DuplicateIdentify),
            ConnectionState::Closed => Err(ChatError::ConnectionClosed),
        }
    }

    pub fn user(&self) -> Option<UserId> {
        match self {
            ConnectionState::Identified(user) => Some(*user),
            _ => None,
        }
    }

    /// The user allowed to send as `sender` on this connection.
    pub fn authorize_sender(&self, sender: UserId) -> Result<UserId, ChatError> {
        match self {
            ConnectionState::Identified(user) if *user == sender => Ok(*user),
            ConnectionState::Identified(_) => Err(ChatError::SenderMismatch),
            ConnectionState::Unidentified => Err(ChatError::NotIdentified),
            ConnectionState::Closed => Err(ChatError::ConnectionClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifecycle_transitions() {
        let alice = UserId::new();
        let bob = UserId::new();

        let state = ConnectionState::default();
        assert_eq!(state.user(), None);

        let state = state.identify(alice).unwrap();
        assert_eq!(state, ConnectionState::Identified(alice));

        // Rebinding is refused, even to the same user.
        assert_eq!(state.identify(bob), Err(ChatError::DuplicateIdentify));
        assert_eq!(state.identify(alice), Err(ChatError::DuplicateIdentify));

        assert_eq!(ConnectionState::Closed.identify(alice), Err(ChatError::ConnectionClosed));
    }

    #[test]
    fn test_sender_authorization() {
        let alice = UserId::new();
        let bob = UserId::new();

        assert_eq!(ConnectionState::Unidentified.authorize_sender(alice), Err(ChatError::NotIdentified));
        assert_eq!(ConnectionState::Identified(alice).authorize_sender(alice), Ok(alice));
        assert_eq!(ConnectionState::Identified(alice).authorize_sender(bob), Err(ChatError::SenderMismatch));
    }

    #[test]
    fn test_client_message_format() {
        let alice = UserId::new();
        let bob = UserId::new();

        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "identify",
            "payload": alice,
        }))
        .unwrap();
        assert_eq!(msg, ClientMessage::Identify(alice));

        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "sendMessage",
            "payload": { "sender": alice, "recipient": bob, "content": "hi" },
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::SubmitMessage(SubmitMessage { sender: alice, recipient: bob, content: "hi".into() })
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"identify","payload":"nope"}"#).is_err());
    }

    #[test]
    fn test_server_message_format() {
        let alice = UserId::new();
        let value = serde_json::to_value(ServerMessage::OnlineUsers(vec![alice])).unwrap();
        assert_eq!(value, json!({ "type": "onlineUsers", "payload": [alice] }));

        let value = serde_json::to_value(ServerMessage::from(&ChatError::NotIdentified)).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["payload"]["code"], "not_identified");
    }
}
