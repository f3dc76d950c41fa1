//! Discord chat client
//!
//! - [`api`]: REST v10 calls (send, fetch, delete)
//! - [`events`]: gateway opcodes and payloads
//! - [`gateway`]: the WebSocket receive loop

pub mod api;
pub mod events;
pub mod gateway;

pub use api::DiscordApiClient;
pub use gateway::DiscordGateway;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::DiscordConfig;
use crate::error::Result;
use crate::models::ChatMessage;

use super::{ChatClient, MessageHandler};

/// [`ChatClient`] backed by the Discord REST API and gateway
pub struct DiscordClient {
    api: DiscordApiClient,
    gateway: DiscordGateway,
}

impl DiscordClient {
    /// Create a client, resolving the bot token from config or environment
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        let token = config.resolve_token()?;
        Ok(Self {
            api: DiscordApiClient::new(token.clone(), config.api_base.clone()),
            gateway: DiscordGateway::new(token, config),
        })
    }
}

#[async_trait]
impl ChatClient for DiscordClient {
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<bool> {
        self.api.create_message(channel_id, content).await?;
        Ok(true)
    }

    async fn get_message(&self, channel_id: &str, message_id: &str) -> Result<ChatMessage> {
        self.api.get_message(channel_id, message_id).await
    }

    async fn get_messages(&self, channel_id: &str, limit: u32) -> Result<Vec<ChatMessage>> {
        self.api.get_messages(channel_id, limit).await
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<bool> {
        self.api.delete_message(channel_id, message_id).await
    }

    async fn listen(
        &self,
        handler: Arc<dyn MessageHandler>,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.gateway.run(handler, cancel).await
    }
}
