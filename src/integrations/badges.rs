use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::{
    constants::{HTTP_CONNECT_TIMEOUT_SECS, HTTP_REQUEST_TIMEOUT_SECS},
    error::{AppError, Result},
    services::achievement_policy::AchievementDefinition,
};

/// Badge id as the service issued it; echoed back in the same JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BadgeId {
    Numeric(i64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisteredBadge {
    pub id: BadgeId,
    pub name: String,
}

/// Remote achievement (badge) catalog.
#[async_trait::async_trait]
pub trait AchievementService: Send + Sync {
    /// Registers the catalog, returning every badge the service knows by id.
    async fn ensure(&self, catalog: &[AchievementDefinition]) -> Result<Vec<RegisteredBadge>>;

    async fn grant(&self, badge_id: &BadgeId, user_id: &str) -> Result<()>;
}

#[derive(Serialize)]
struct EnsureBadgesRequest<'a> {
    badges: &'a [AchievementDefinition],
    #[serde(rename = "botId")]
    bot_id: &'a str,
}

#[derive(Serialize)]
struct GrantBadgeRequest<'a> {
    #[serde(rename = "badgeId")]
    badge_id: &'a BadgeId,
    #[serde(rename = "userId")]
    user_id: &'a str,
    #[serde(rename = "botId")]
    bot_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct BadgesClient {
    client: Client,
    api_url: Url,
    bot_user_id: String,
}

impl BadgesClient {
    pub fn new(api_url: &str, bot_user_id: String) -> Result<Self> {
        let trimmed = api_url.trim().trim_end_matches('/');
        let api_url = Url::parse(&format!("{}/", trimmed))
            .map_err(|e| AppError::Internal(format!("Invalid badges URL: {}", e)))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(format!("Badges HTTP client init failed: {}", e)))?;
        Ok(Self {
            client,
            api_url,
            bot_user_id,
        })
    }

    // Internal helper that supports `endpoint` operations.
    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(path)
            .map_err(|e| AppError::Internal(format!("Invalid badges path {}: {}", path, e)))
    }
}

#[async_trait::async_trait]
impl AchievementService for BadgesClient {
    async fn ensure(&self, catalog: &[AchievementDefinition]) -> Result<Vec<RegisteredBadge>> {
        let response = self
            .client
            .post(self.endpoint("ensure")?)
            .json(&EnsureBadgesRequest {
                badges: catalog,
                bot_id: &self.bot_user_id,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::DownstreamFailure(format!(
                "Badge ensure failed with {}: {}",
                status, body
            )));
        }
        Ok(response.json().await?)
    }

    async fn grant(&self, badge_id: &BadgeId, user_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint("grant")?)
            .json(&GrantBadgeRequest {
                badge_id,
                user_id,
                bot_id: &self.bot_user_id,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::DownstreamFailure(format!(
                "Badge grant failed with {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Grants achievements by name using a catalog resolved once at startup.
///
/// Every failure is logged and swallowed; callers never see an error.
#[derive(Clone, Default)]
pub struct AchievementGranter {
    service: Option<Arc<dyn AchievementService>>,
    badge_ids: HashMap<String, BadgeId>,
}

impl AchievementGranter {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Registers `catalog` and keeps the name-to-id map for later grants.
    pub async fn bootstrap(
        service: Arc<dyn AchievementService>,
        catalog: &[AchievementDefinition],
    ) -> Self {
        let badge_ids = match service.ensure(catalog).await {
            Ok(badges) => badges
                .into_iter()
                .map(|badge| (badge.name, badge.id))
                .collect(),
            Err(err) => {
                tracing::warn!("Achievement catalog unavailable, grants disabled: {}", err);
                HashMap::new()
            }
        };
        tracing::info!("Achievement catalog resolved with {} badges", badge_ids.len());
        Self {
            service: Some(service),
            badge_ids,
        }
    }

    pub async fn grant(&self, name: &str, user_id: &str) {
        let Some(service) = &self.service else {
            tracing::debug!("Achievements disabled; skipping {} for {}", name, user_id);
            return;
        };
        let Some(badge_id) = self.badge_ids.get(name) else {
            tracing::debug!("Achievement {} not recognized", name);
            return;
        };

        match service.grant(badge_id, user_id).await {
            Ok(()) => tracing::debug!(
                "Achievement granted name={} badge_id={:?} user={}",
                name,
                badge_id,
                user_id
            ),
            Err(err) => tracing::warn!(
                "Achievement grant failed name={} user={} err={}",
                name,
                user_id,
                err
            ),
        }
    }
}
