// src/models/mod.rs
pub mod game;

pub use game::{
    FlipCardRequest,
    FlipCardResponse,
    Game,
    GameView,
    NudgeResponse,
    PlayerStats,
    PushEvent,
    StartGameRequest,
    StartGameResponse,
};

use serde::Serialize;

// ==================== API RESPONSE ====================
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
