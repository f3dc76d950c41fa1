//! Command pipeline
//!
//! Turns one inbound chat message into mail actions and replies:
//!
//! 1. [`resolve`] the text to a [`Command`](crate::models::Command), first
//!    through the completion service and then through the rule-based parser
//! 2. [`Dispatcher::execute`] the command against the sender's mail client
//! 3. send the reply chunks back to the originating channel
//!
//! When nothing resolves, [`fallback_reply`] may answer conversationally;
//! if it cannot, the message is dropped.

pub mod dispatch;
pub mod extract;
pub mod format;
pub mod parser;
pub mod reply;
pub mod resolve;

pub use dispatch::{Dispatcher, MISSING_MESSAGE_ID};
pub use extract::{extract, Extraction};
pub use format::{chunk, format_detail, format_entry, format_summary_line};
pub use parser::parse_fallback;
pub use reply::fallback_reply;
pub use resolve::{resolve, Resolution};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::ai::AiBackend;
use crate::chat::{ChatClient, MessageHandler};
use crate::config::BotConfig;
use crate::mail::MailClientFactory;
use crate::models::ChatMessage;

/// The mail assistant behind the chat bot
pub struct Assistant {
    chat: Arc<dyn ChatClient>,
    mail: Arc<dyn MailClientFactory>,
    ai: AiBackend,
    dispatcher: Dispatcher,
}

impl Assistant {
    pub fn new(
        chat: Arc<dyn ChatClient>,
        mail: Arc<dyn MailClientFactory>,
        ai: AiBackend,
        config: &BotConfig,
    ) -> Self {
        Self {
            chat,
            mail,
            ai,
            dispatcher: Dispatcher::new(config.default_max_results, config.chunk_limit),
        }
    }

    /// Resolve `text` without executing anything
    pub async fn interpret(&self, text: &str) -> Resolution {
        resolve(&self.ai, text).await
    }

    /// Run the whole pipeline for one inbound message
    pub async fn handle(&self, message: &ChatMessage) {
        if message.content.trim().is_empty() {
            debug!(channel_id = %message.channel_id, "Ignoring empty message");
            return;
        }

        let resolution = self.interpret(&message.content).await;
        let command = match resolution {
            Resolution::Command(command) => command,
            other => {
                match fallback_reply(&self.ai, &message.content, other.reason()).await {
                    Some(reply) => self.send_all(&message.channel_id, &[reply]).await,
                    None => debug!(
                        channel_id = %message.channel_id,
                        reason = ?other.reason(),
                        "No command and no fallback reply, dropping message"
                    ),
                }
                return;
            }
        };

        info!(
            user_id = %message.sender_id,
            action = %command.action,
            "Dispatching command"
        );

        let mail = match self.mail.client_for(&message.sender_id) {
            Ok(mail) => mail,
            Err(e) => {
                error!(user_id = %message.sender_id, error = %e, "No mail client for user");
                self.send_all(&message.channel_id, &[format!("Error: {}", e)])
                    .await;
                return;
            }
        };

        let replies = self.dispatcher.execute(mail.as_ref(), &command).await;
        self.send_all(&message.channel_id, &replies).await;
    }

    /// Send replies in order, stopping at the first failed send
    async fn send_all(&self, channel_id: &str, replies: &[String]) {
        for reply in replies.iter().filter(|r| !r.trim().is_empty()) {
            if let Err(e) = self.chat.send_message(channel_id, reply).await {
                error!(channel_id = %channel_id, error = %e, "Failed to send reply");
                return;
            }
        }
    }
}

#[async_trait]
impl MessageHandler for Assistant {
    async fn on_message(&self, message: ChatMessage) {
        self.handle(&message).await;
    }
}
