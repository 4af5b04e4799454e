use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::{
    constants::{DIRECT_CHANNEL_TYPE, HTTP_CONNECT_TIMEOUT_SECS, HTTP_REQUEST_TIMEOUT_SECS},
    error::{AppError, Result},
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatUser {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatChannel {
    pub id: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    pub name: String,
}

impl ChatChannel {
    pub fn is_direct(&self) -> bool {
        self.channel_type == DIRECT_CHANNEL_TYPE
    }

    /// The other member of a direct channel named `<user>__<user>`.
    ///
    /// Returns `None` when `user_id` is not one of the two members.
    pub fn other_member_for_dm(&self, user_id: &str) -> Option<&str> {
        let (first, second) = self.name.split_once("__")?;
        if first == user_id {
            Some(second)
        } else if second == user_id {
            Some(first)
        } else {
            None
        }
    }
}

/// Identity and messaging operations the game needs from the chat platform.
#[async_trait::async_trait]
pub trait ChatDirectory: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<ChatUser>;

    async fn get_channel(&self, channel_id: &str) -> Result<ChatChannel>;

    /// Sends `message` from the game bot to `user_id`.
    async fn send_direct_message(&self, user_id: &str, message: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct CreatePostRequest<'a> {
    channel_id: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct DirectChannelResponse {
    id: String,
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    base_url: Url,
    bot_token: String,
    bot_user_id: String,
}

// Internal helper that parses or transforms values for `normalize_base_url`.
fn normalize_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    Url::parse(&with_slash)
        .map_err(|e| AppError::Internal(format!("Invalid chat API URL: {}", e)))
}

impl ChatClient {
    /// Constructs a new instance via `new`.
    ///
    /// # Arguments
    /// * `api_url` - chat server base URL; REST paths are resolved under it.
    /// * `bot_token` - bearer token of the game bot account.
    /// * `bot_user_id` - the bot's user id, used as the sender of direct messages.
    ///
    /// # Returns
    /// * `Err(AppError::Internal)` when the URL is malformed or the HTTP client cannot be built.
    pub fn new(api_url: &str, bot_token: String, bot_user_id: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Internal(format!("Chat HTTP client init failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: normalize_base_url(api_url)?,
            bot_token,
            bot_user_id,
        })
    }

    // Internal helper that supports `endpoint` operations.
    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Internal(format!("Invalid chat API path {}: {}", path, e)))
    }

    // Internal helper that fetches data for `get_json`.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let response = self
            .client
            .get(self.endpoint(path)?)
            .bearer_auth(&self.bot_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("{} not found", what)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::DownstreamFailure(format!(
                "Chat {} lookup failed with {}: {}",
                what, status, body
            )));
        }
        Ok(response.json().await?)
    }

    // Internal helper that runs side-effecting logic for `open_direct_channel`.
    async fn open_direct_channel(&self, user_id: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("api/v4/channels/direct")?)
            .bearer_auth(&self.bot_token)
            .json(&[self.bot_user_id.as_str(), user_id])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::DownstreamFailure(format!(
                "Cannot open direct channel with {}: {}",
                user_id,
                response.status()
            )));
        }
        let channel: DirectChannelResponse = response.json().await?;
        Ok(channel.id)
    }
}

#[async_trait::async_trait]
impl ChatDirectory for ChatClient {
    async fn get_user(&self, user_id: &str) -> Result<ChatUser> {
        self.get_json(&format!("api/v4/users/{}", user_id), "user")
            .await
    }

    async fn get_channel(&self, channel_id: &str) -> Result<ChatChannel> {
        self.get_json(&format!("api/v4/channels/{}", channel_id), "channel")
            .await
    }

    async fn send_direct_message(&self, user_id: &str, message: &str) -> Result<()> {
        let channel_id = self.open_direct_channel(user_id).await?;
        let response = self
            .client
            .post(self.endpoint("api/v4/posts")?)
            .bearer_auth(&self.bot_token)
            .json(&CreatePostRequest {
                channel_id: &channel_id,
                message,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::DownstreamFailure(format!(
                "Direct message to {} failed: {}",
                user_id,
                response.status()
            )));
        }
        tracing::debug!("Direct message sent to {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dm(name: &str) -> ChatChannel {
        ChatChannel {
            id: "c1".to_string(),
            channel_type: "D".to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn other_member_resolves_either_side() {
        let channel = dm("alice__bob");
        assert_eq!(channel.other_member_for_dm("alice"), Some("bob"));
        assert_eq!(channel.other_member_for_dm("bob"), Some("alice"));
        assert_eq!(channel.other_member_for_dm("carol"), None);
        assert!(channel.is_direct());
    }

    #[test]
    fn chat_user_keeps_only_username() {
        let user: ChatUser =
            serde_json::from_str(r#"{"id": "u1", "username": "alice", "email": "a@x"}"#).unwrap();
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn malformed_channel_name_has_no_other_member() {
        assert_eq!(dm("town-square").other_member_for_dm("alice"), None);
    }

    #[test]
    fn base_url_gets_trailing_slash_for_joins() {
        let client = ChatClient::new(
            "http://chat.local/sub",
            "token".to_string(),
            "bot".to_string(),
        )
        .unwrap();
        let url = client.endpoint("api/v4/users/u1").unwrap();
        assert_eq!(url.as_str(), "http://chat.local/sub/api/v4/users/u1");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(ChatClient::new("not a url", "t".to_string(), "b".to_string()).is_err());
    }
}
