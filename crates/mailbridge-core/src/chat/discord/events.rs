//! Discord gateway v10 opcodes and payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::ChatMessage;

pub const OP_DISPATCH: u8 = 0;
pub const OP_HEARTBEAT: u8 = 1;
pub const OP_IDENTIFY: u8 = 2;
pub const OP_RESUME: u8 = 6;
pub const OP_RECONNECT: u8 = 7;
pub const OP_INVALID_SESSION: u8 = 9;
pub const OP_HELLO: u8 = 10;
pub const OP_HEARTBEAT_ACK: u8 = 11;

/// Gateway envelope, both directions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u8,

    /// Event data; `null` for heartbeats without a sequence
    pub d: Option<Value>,

    /// Sequence number (dispatch only)
    #[serde(default)]
    pub s: Option<u64>,

    /// Event name (dispatch only)
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayPayload {
    /// Outgoing payload with no sequence or event name
    pub fn outgoing(op: u8, d: Option<Value>) -> Self {
        Self { op, d, s: None, t: None }
    }

    /// Heartbeat carrying the last sequence seen (null before any dispatch)
    pub fn heartbeat(seq: u64) -> Self {
        Self::outgoing(OP_HEARTBEAT, (seq > 0).then(|| Value::from(seq)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelloData {
    /// Milliseconds between heartbeats
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: u32,
    pub properties: ConnectionProperties,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadyEvent {
    pub user: User,
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}

/// A message as delivered by `MESSAGE_CREATE` or returned by the REST API
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMessage {
    pub id: String,
    pub channel_id: String,
    #[serde(default)]
    pub content: String,
    pub author: User,
    /// Present for guild messages, absent for DMs
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub edited_timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Display name, falling back to the username
    pub fn display_name(&self) -> &str {
        self.global_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }
}

impl From<DiscordMessage> for ChatMessage {
    fn from(msg: DiscordMessage) -> Self {
        ChatMessage {
            sender_name: msg.author.display_name().to_string(),
            id: msg.id,
            channel_id: msg.channel_id,
            sender_id: msg.author.id,
            content: msg.content,
            timestamp: msg.timestamp,
            edited_timestamp: msg.edited_timestamp.filter(|t| !t.is_empty()),
        }
    }
}
