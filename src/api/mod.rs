// src/api/mod.rs

pub mod game;
pub mod health;

use axum::http::HeaderMap;

use crate::config::Config;
use crate::constants::USER_ID_HEADER;
use crate::error::{AppError, Result};
use crate::services::GameService;

#[derive(Clone)]
pub struct AppState {
    pub games: GameService,
    pub config: Config,
}

/// Chat user id forwarded by the platform in front of this service.
pub fn require_user(headers: &HeaderMap) -> Result<String> {
    let raw = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| AppError::AuthError("Not authorized".to_string()))?;
    let user_id = raw
        .to_str()
        .map_err(|_| AppError::AuthError("Invalid user header".to_string()))?
        .trim();
    if user_id.is_empty() {
        return Err(AppError::AuthError("Not authorized".to_string()));
    }
    Ok(user_id.to_string())
}
