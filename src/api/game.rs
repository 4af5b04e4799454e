use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use crate::{
    error::Result,
    models::{
        ApiResponse, FlipCardRequest, FlipCardResponse, GameView, NudgeResponse,
        StartGameRequest, StartGameResponse,
    },
};

use super::{require_user, AppState};

/// POST /api/v1/start
pub async fn start_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StartGameRequest>,
) -> Result<Json<ApiResponse<StartGameResponse>>> {
    let user_id = require_user(&headers)?;
    let response = state.games.start_game(&user_id, &req.channel_id).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// GET /api/v1/game/{game_id}
pub async fn get_game(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(game_id): Path<String>,
) -> Result<Json<ApiResponse<GameView>>> {
    let user_id = require_user(&headers)?;
    let view = state.games.get_view(&game_id, &user_id).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// POST /api/v1/game/{game_id}/flip
pub async fn flip_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(game_id): Path<String>,
    Json(req): Json<FlipCardRequest>,
) -> Result<Json<ApiResponse<FlipCardResponse>>> {
    let user_id = require_user(&headers)?;
    let response = state.games.flip(&game_id, &user_id, req.index).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// GET /api/v1/game/{game_id}/ping
pub async fn ping(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(game_id): Path<String>,
) -> Result<Json<ApiResponse<NudgeResponse>>> {
    let user_id = require_user(&headers)?;
    state.games.nudge(&game_id, &user_id).await?;
    Ok(Json(ApiResponse::success(NudgeResponse {})))
}
