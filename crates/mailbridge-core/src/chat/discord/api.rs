//! Discord REST API client

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use tracing::debug;

use crate::chat::MAX_HISTORY_LIMIT;
use crate::error::{Error, Result};
use crate::models::ChatMessage;

use super::events::DiscordMessage;

/// HTTP client for the Discord REST API with bot authentication
pub struct DiscordApiClient {
    http: Client,
    token: String,
    base_url: String,
}

impl DiscordApiClient {
    pub fn new(token: String, base_url: String) -> Self {
        Self {
            http: Client::new(),
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bot {}", self.token))
    }

    /// Send a message; returns the new message id
    pub async fn create_message(&self, channel_id: &str, content: &str) -> Result<String> {
        if content.trim().is_empty() {
            return Err(Error::ChatSend("Message content cannot be empty".to_string()));
        }

        debug!(channel_id = %channel_id, "creating message");
        let resp = self
            .request(Method::POST, &format!("/channels/{}/messages", channel_id))
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .map_err(|e| Error::ChatSend(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ChatSend(format!(
                "Discord API returned {}: {}",
                status, body
            )));
        }

        let msg: DiscordMessage = resp
            .json()
            .await
            .map_err(|e| Error::ChatSend(e.to_string()))?;
        Ok(msg.id)
    }

    pub async fn get_message(&self, channel_id: &str, message_id: &str) -> Result<ChatMessage> {
        let resp = self
            .request(
                Method::GET,
                &format!("/channels/{}/messages/{}", channel_id, message_id),
            )
            .send()
            .await?;

        match resp.status() {
            StatusCode::NOT_FOUND => Err(not_found(channel_id, message_id)),
            status if !status.is_success() => Err(Error::Chat(format!(
                "Failed to retrieve message: {}",
                status
            ))),
            _ => Ok(resp.json::<DiscordMessage>().await?.into()),
        }
    }

    /// Recent channel history, newest first
    pub async fn get_messages(&self, channel_id: &str, limit: u32) -> Result<Vec<ChatMessage>> {
        let limit = limit.min(MAX_HISTORY_LIMIT).to_string();
        let resp = self
            .request(Method::GET, &format!("/channels/{}/messages", channel_id))
            .query(&[("limit", limit.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Chat(format!(
                "Failed to retrieve messages: {}",
                status
            )));
        }

        let messages: Vec<DiscordMessage> = resp.json().await?;
        Ok(messages.into_iter().map(ChatMessage::from).collect())
    }

    pub async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<bool> {
        let resp = self
            .request(
                Method::DELETE,
                &format!("/channels/{}/messages/{}", channel_id, message_id),
            )
            .send()
            .await?;

        match resp.status() {
            StatusCode::NOT_FOUND => Err(not_found(channel_id, message_id)),
            status if !status.is_success() => Err(Error::Chat(format!(
                "Failed to delete message: {}",
                status
            ))),
            _ => Ok(true),
        }
    }
}

fn not_found(channel_id: &str, message_id: &str) -> Error {
    Error::Chat(format!(
        "Message {} not found in channel {}",
        message_id, channel_id
    ))
}
