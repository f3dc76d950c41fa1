//! Command (intent) data structures

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default number of messages listed by `get_messages`
pub const DEFAULT_MAX_RESULTS: u32 = 10;

/// The fixed set of mail operations a chat message can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Login,
    Logout,
    GetMessages,
    GetMessage,
    DeleteMessage,
    MarkAsRead,
}

impl Action {
    /// Every action, in schema order
    pub const ALL: [Action; 6] = [
        Action::Login,
        Action::Logout,
        Action::GetMessages,
        Action::GetMessage,
        Action::DeleteMessage,
        Action::MarkAsRead,
    ];

    /// Wire name used in the extraction schema
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Login => "login",
            Action::Logout => "logout",
            Action::GetMessages => "get_messages",
            Action::GetMessage => "get_message",
            Action::DeleteMessage => "delete_message",
            Action::MarkAsRead => "mark_as_read",
        }
    }

    /// Whether dispatching this action needs a `message_id`
    pub fn requires_message_id(&self) -> bool {
        matches!(
            self,
            Action::GetMessage | Action::DeleteMessage | Action::MarkAsRead
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("Unrecognized action: {}", s))
    }
}

/// A validated, schema-conforming command
///
/// `action` is always one of the enumerated [`Action`]s. The optional fields
/// are only meaningful for the actions that use them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub action: Action,

    /// Number of messages to list (`get_messages` only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,

    /// Target message (`get_message`, `delete_message`, `mark_as_read`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl Command {
    /// Create a command with no arguments
    pub fn new(action: Action) -> Self {
        Self {
            action,
            max_results: None,
            message_id: None,
        }
    }

    pub fn login() -> Self {
        Self::new(Action::Login)
    }

    pub fn logout() -> Self {
        Self::new(Action::Logout)
    }

    pub fn get_messages(max_results: u32) -> Self {
        Self {
            max_results: Some(max_results),
            ..Self::new(Action::GetMessages)
        }
    }

    pub fn get_message(message_id: impl Into<String>) -> Self {
        Self::with_message_id(Action::GetMessage, message_id)
    }

    pub fn delete_message(message_id: impl Into<String>) -> Self {
        Self::with_message_id(Action::DeleteMessage, message_id)
    }

    pub fn mark_as_read(message_id: impl Into<String>) -> Self {
        Self::with_message_id(Action::MarkAsRead, message_id)
    }

    fn with_message_id(action: Action, message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            ..Self::new(action)
        }
    }

    /// Requested result count, falling back to `default` when absent or zero
    pub fn max_results_or(&self, default: u32) -> u32 {
        match self.max_results {
            Some(n) if n > 0 => n,
            _ => default,
        }
    }

    /// The message id, if present and non-blank
    pub fn message_id(&self) -> Option<&str> {
        self.message_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}
