//! Chat message data structures

use serde::{Deserialize, Serialize};

/// A message seen on the chat platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Platform message id
    pub id: String,

    /// Channel the message was posted in (a DM channel for inbound commands)
    pub channel_id: String,

    /// Author's platform user id
    pub sender_id: String,

    /// Author's display name
    pub sender_name: String,

    /// Free-text content
    pub content: String,

    /// Creation timestamp (ISO 8601)
    pub timestamp: String,

    /// Last edit timestamp, if edited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<String>,
}
