use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod db;
mod error;
mod integrations;
mod models;
mod services;
mod websocket;

use config::Config;
use constants::API_VERSION;
use db::Database;
use integrations::{AchievementGranter, BadgesClient, ChatClient};
use services::{achievement_policy::CATALOG, GameService, NotificationService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memory_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting memory game backend");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    let db = Database::new(&config).await?;
    tracing::info!("Store backend: {}", db.store().backend_name());

    let chat = ChatClient::new(
        &config.chat_api_url,
        config.chat_bot_token.clone(),
        config.bot_user_id.clone(),
    )?;

    // Achievement ids are resolved once here and handed to the game service
    let achievements = match &config.badges_api_url {
        Some(url) => {
            let client = BadgesClient::new(url, config.bot_user_id.clone())?;
            AchievementGranter::bootstrap(Arc::new(client), &CATALOG).await
        }
        None => AchievementGranter::disabled(),
    };

    let games = GameService::new(db, NotificationService::new(), Arc::new(chat), achievements);

    let app_state = api::AppState {
        games,
        config: config.clone(),
    };

    let app = build_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Game
        .route("/api/v1/start", post(api::game::start_game))
        .route("/api/v1/game/{game_id}", get(api::game::get_game))
        .route("/api/v1/game/{game_id}/flip", post(api::game::flip_card))
        .route("/api/v1/game/{game_id}/ping", get(api::game::ping))
        // WebSocket endpoint
        .route("/ws", get(websocket::notifications::handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
