use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{error, info};

use crate::auth::NewUser;
use crate::{AppState, Result};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let req = req.into_inner();
    info!("Received registration request for username: {}", req.username);

    let new_user = NewUser {
        username: req.username,
        password: req.password,
        name: req.name,
        email: req.email,
        role: req.role,
    };

    match state.auth.register(new_user).await {
        Ok(user) => Ok(HttpResponse::Created().json(user)),
        Err(e) => {
            error!("Registration failed: {}", e);
            Err(e)
        }
    }
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    info!("Received login request for username: {}", req.username);

    match state.auth.login(&req.username, &req.password).await {
        Ok(user) => {
            info!("Login successful for username: {}", req.username);
            Ok(HttpResponse::Ok().json(user))
        }
        Err(e) => {
            error!("Login failed for username: {}: {}", req.username, e);
            Err(e)
        }
    }
}

pub async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse> {
    let users = state.auth.list_users().await?;
    Ok(HttpResponse::Ok().json(users))
}
