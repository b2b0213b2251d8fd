use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

use crate::db::{User, UserDirectory};
use crate::error::{AuthError, DatabaseError};
use crate::{AppError, Result};

const SALT_SIZE: usize = 16;

/// Registration and login over the user directory.
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    pub async fn register(&self, new_user: NewUser) -> Result<User> {
        let fields = [
            &new_user.username,
            &new_user.password,
            &new_user.name,
            &new_user.email,
            &new_user.role,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(AuthError::MissingFields.into());
        }

        if self.users.find_by_username(&new_user.username).await?.is_some() {
            return Err(AuthError::UsernameTaken.into());
        }

        let user = User::new(
            new_user.username,
            hash_password(&new_user.password),
            new_user.name,
            new_user.email,
            new_user.role,
        );

        // A concurrent registration can still win the unique index.
        let user = self.users.create_user(&user).await.map_err(|e| match e {
            AppError::DatabaseError(DatabaseError::Duplicate) => AuthError::UsernameTaken.into(),
            other => other,
        })?;

        info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields.into());
        }

        match self.users.find_by_username(username).await? {
            Some(user) if verify_password(password, &user.password_hash) => Ok(user),
            _ => Err(AuthError::InvalidCredentials.into()),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.users.list_users().await
    }
}

/// `base64(salt)$base64(sha256(salt || password))`
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    format!("{}${}", BASE64.encode(salt), BASE64.encode(digest(&salt, password)))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, hash)) = stored.split_once('$') else {
        return false;
    };
    match (BASE64.decode(salt), BASE64.decode(hash)) {
        (Ok(salt), Ok(hash)) => digest(&salt, password).as_slice() == hash.as_slice(),
        _ => false,
    }
}

fn digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}
