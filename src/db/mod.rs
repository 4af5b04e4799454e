use std::collections::HashMap;
use std::sync::Arc;

use redis::AsyncCommands;
use tokio::sync::RwLock;

use crate::{
    config::{Config, StoreBackend},
    constants::{GAME_KEY_PREFIX, STATS_KEY_PREFIX},
    error::{AppError, Result},
    models::{Game, PlayerStats},
};

// ==================== KEY-VALUE STORE ====================

/// Byte-oriented key-value store; last write wins.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn is_healthy(&self) -> bool;

    fn backend_name(&self) -> &'static str;
}

#[derive(Clone)]
pub struct RedisStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Process-local store for tests and single-node development runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// ==================== DATABASE ====================

/// Typed access to games and player stats on top of a [`KvStore`].
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn KvStore>,
}

// Internal helper that supports `game_key` operations.
fn game_key(game_id: &str) -> String {
    format!("{}{}", GAME_KEY_PREFIX, game_id)
}

// Internal helper that supports `stats_key` operations.
fn stats_key(user_id: &str) -> String {
    format!("{}{}", STATS_KEY_PREFIX, user_id)
}

impl Database {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn KvStore> = match config.store_backend {
            StoreBackend::Redis => Arc::new(RedisStore::connect(&config.redis_url).await?),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(Self { store })
    }

    pub fn with_store(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }
}

// ==================== GAME QUERIES ====================
impl Database {
    pub async fn get_game(&self, game_id: &str) -> Result<Game> {
        let raw = self
            .store
            .get(&game_key(game_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Game not found".to_string()))?;
        let game: Game = serde_json::from_slice(&raw)?;
        game.check_invariants()
            .map_err(|reason| AppError::Storage(format!("corrupt game {}: {}", game_id, reason)))?;
        Ok(game)
    }

    pub async fn set_game(&self, game: &Game) -> Result<()> {
        let raw = serde_json::to_vec(game)?;
        self.store.set(&game_key(&game.id), raw).await
    }

    pub async fn remove_game(&self, game_id: &str) -> Result<()> {
        self.store.delete(&game_key(game_id)).await
    }
}

// ==================== PLAYER STATS QUERIES ====================
impl Database {
    /// Missing stats read as the zero value.
    pub async fn get_player_stats(&self, user_id: &str) -> Result<PlayerStats> {
        match self.store.get(&stats_key(user_id)).await? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Ok(PlayerStats::default()),
        }
    }

    pub async fn set_player_stats(&self, user_id: &str, stats: &PlayerStats) -> Result<()> {
        let raw = serde_json::to_vec(stats)?;
        self.store.set(&stats_key(user_id), raw).await
    }
}
