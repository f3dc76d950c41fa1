//! Chat platform abstraction
//!
//! The bridge consumes the chat platform through [`ChatClient`]: send text to
//! a channel, and receive inbound messages through a [`MessageHandler`].

pub mod discord;

pub use discord::DiscordClient;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::ChatMessage;

/// Most messages a single history request may return
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Chat platform operations
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send text to a channel
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<bool>;

    /// Fetch a single message
    async fn get_message(&self, channel_id: &str, message_id: &str) -> Result<ChatMessage>;

    /// Fetch recent messages in a channel (limit clamped to [`MAX_HISTORY_LIMIT`])
    async fn get_messages(&self, channel_id: &str, limit: u32) -> Result<Vec<ChatMessage>>;

    /// Delete a message
    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<bool>;

    /// Receive inbound messages until `cancel` fires
    async fn listen(
        &self,
        handler: Arc<dyn MessageHandler>,
        cancel: CancellationToken,
    ) -> Result<()>;
}

/// Receives inbound chat messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, message: ChatMessage);
}
