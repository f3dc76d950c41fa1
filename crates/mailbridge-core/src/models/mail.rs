//! Mail message data structures

use serde::{Deserialize, Serialize};

/// A mail message as returned by the mail provider
///
/// Messages from a listing are summaries: `body` may be empty and that is
/// not an error. Use a detail fetch to get the full body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    /// Provider message id
    pub id: String,

    /// From header
    pub from: String,

    /// To header
    pub to: String,

    /// Date header, as sent
    pub date: String,

    /// Subject line
    pub subject: String,

    /// Short preview
    pub snippet: String,

    /// Plain text body (empty for summaries)
    #[serde(default)]
    pub body: String,
}

impl MailMessage {
    /// True when the body was not fetched or is blank
    pub fn is_summary(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// Result of starting an authorization flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Provider consent URL to send the user to
    pub authorization_url: String,

    /// Anti-forgery state bound to the requesting user
    pub state: String,
}

/// Result of completing an authorization flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedUser {
    /// Chat user the credentials were stored for
    pub user_id: String,
}
