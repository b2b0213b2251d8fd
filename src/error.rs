use thiserror::Error;
use actix_web::{ResponseError, HttpResponse, http::StatusCode};
use serde_json::json;

use crate::db::UserId;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Chat error: {0}")]
    ChatError(#[from] ChatError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

// Implement conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

// Implement conversion from sqlx::Error
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::DatabaseError(DatabaseError::MigrationError(err.to_string()))
    }
}

// Add conversion from std::io::Error
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

// Implement actix_web::ResponseError for AppError
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = self.to_string();
        let response = json!({
            "error": {
                "status": status.as_u16(),
                "message": message
            }
        });
        HttpResponse::build(status).json(response)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthError(e) => match e {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::MissingFields => StatusCode::BAD_REQUEST,
                AuthError::UsernameTaken => StatusCode::CONFLICT,
            },
            AppError::ChatError(e) => match e {
                ChatError::PersistenceFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
                ChatError::DirectoryUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ChatError::UnknownUser(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            },
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(DatabaseError::NotFound) => StatusCode::NOT_FOUND,
            AppError::DatabaseError(DatabaseError::Duplicate) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Username, password, role, name and email are required")]
    MissingFields,

    #[error("Username already exists")]
    UsernameTaken,
}

/// Failures of the messaging core.
///
/// Only `PersistenceFailure` (and the validation variants that stop a
/// submission before anything is written) ever reach the submitting client.
/// `DeliveryFailure` is logged by the router and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Message could not be persisted: {0}")]
    PersistenceFailure(String),

    #[error("Delivery to connection failed: {0}")]
    DeliveryFailure(String),

    #[error("User directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Connection is already identified")]
    DuplicateIdentify,

    #[error("Connection has not identified a user")]
    NotIdentified,

    #[error("Sender does not match the identified user")]
    SenderMismatch,

    #[error("Unknown user: {0}")]
    UnknownUser(UserId),

    #[error("Message exceeds {limit} characters")]
    MessageTooLong { limit: usize },

    #[error("Connection is closed")]
    ConnectionClosed,
}

impl ChatError {
    /// Stable code sent to websocket clients in `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::PersistenceFailure(_) => "persistence_failure",
            ChatError::DeliveryFailure(_) => "delivery_failure",
            ChatError::DirectoryUnavailable(_) => "directory_unavailable",
            ChatError::DuplicateIdentify => "duplicate_identify",
            ChatError::NotIdentified => "not_identified",
            ChatError::SenderMismatch => "sender_mismatch",
            ChatError::UnknownUser(_) => "unknown_user",
            ChatError::MessageTooLong { .. } => "message_too_long",
            ChatError::ConnectionClosed => "connection_closed",
        }
    }
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => DatabaseError::Duplicate,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionError(err.to_string())
            }
            _ => DatabaseError::QueryError(err.to_string()),
        }
    }
}
