use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl StoreBackend {
    // Internal helper that parses or transforms values for `parse`.
    fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" | "mem" => Ok(Self::Memory),
            other => anyhow::bail!("Unknown STORE_BACKEND: {}", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Storage
    pub store_backend: StoreBackend,
    pub redis_url: String,

    // Chat platform
    pub chat_api_url: String,
    pub chat_bot_token: String,
    pub bot_user_id: String,

    // Achievements
    pub badges_api_url: Option<String>,

    // CORS
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            store_backend: StoreBackend::parse(
                &env::var("STORE_BACKEND").unwrap_or_else(|_| "redis".to_string()),
            )?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),

            chat_api_url: env::var("CHAT_API_URL")?,
            chat_bot_token: env::var("CHAT_BOT_TOKEN")?,
            bot_user_id: env::var("BOT_USER_ID")?,

            badges_api_url: env::var("BADGES_API_URL")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chat_api_url.trim().is_empty() {
            anyhow::bail!("CHAT_API_URL is empty");
        }
        if self.chat_bot_token.trim().is_empty() {
            anyhow::bail!("CHAT_BOT_TOKEN is empty");
        }
        if self.bot_user_id.trim().is_empty() {
            anyhow::bail!("BOT_USER_ID is empty");
        }
        if self.store_backend == StoreBackend::Redis && self.redis_url.trim().is_empty() {
            anyhow::bail!("REDIS_URL is empty");
        }

        if self.store_backend == StoreBackend::Memory && !self.is_development() {
            tracing::warn!("In-memory store outside development; games are lost on restart");
        }
        if self.badges_api_url.is_none() {
            tracing::warn!("BADGES_API_URL not set; achievements are disabled");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        environment: "test".to_string(),
        store_backend: StoreBackend::Memory,
        redis_url: "redis://localhost:6379".to_string(),
        chat_api_url: "http://localhost:8065".to_string(),
        chat_bot_token: "bot_token".to_string(),
        bot_user_id: "memory_bot".to_string(),
        badges_api_url: None,
        cors_allowed_origins: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_known_values() {
        assert_eq!(StoreBackend::parse("redis").unwrap(), StoreBackend::Redis);
        assert_eq!(StoreBackend::parse(" Memory ").unwrap(), StoreBackend::Memory);
        assert!(StoreBackend::parse("postgres").is_err());
    }

    #[test]
    fn validate_rejects_missing_bot_user() {
        let mut config = test_config();
        config.bot_user_id = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_test_config() {
        assert!(test_config().validate().is_ok());
        assert!(test_config().is_development());
    }
}
