use axum::{extract::State, Json};
use serde::Serialize;
use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
    pub connected_users: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.games.db().store();
    let store_status = if store.is_healthy().await {
        format!("{}: connected", store.backend_name())
    } else {
        format!("{}: disconnected", store.backend_name())
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store_status,
        connected_users: state.games.notifications().connected_users().await,
    })
}
