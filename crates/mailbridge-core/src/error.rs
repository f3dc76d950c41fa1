//! Error types for MailBridge

use thiserror::Error;

/// Result type alias using MailBridge's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for MailBridge
#[derive(Error, Debug)]
pub enum Error {
    // Authentication errors
    #[error("No stored credentials for user {user_id}")]
    CredentialsMissing { user_id: String },

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Invalid or expired OAuth state")]
    InvalidOAuthState,

    #[error("Token refresh failed for user {user_id}: {reason}")]
    TokenRefreshFailed { user_id: String, reason: String },

    #[error("Credential storage error: {0}")]
    CredentialStore(String),

    // Mail provider errors
    #[error("Mail API returned {status}: {message}")]
    MailApi { status: u16, message: String },

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    // Chat errors
    #[error("Chat error: {0}")]
    Chat(String),

    #[error("Failed to send message: {0}")]
    ChatSend(String),

    // Completion service errors
    #[error("{0}")]
    AiUnavailable(String),

    #[error("{0}")]
    AiRequest(String),

    #[error("{0}")]
    AiResponse(String),

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // Generic errors
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Returns true if the mail provider has no credentials for the user
    pub fn is_credentials_missing(&self) -> bool {
        matches!(self, Error::CredentialsMissing { .. })
    }

    /// Returns true if this error indicates the user needs to re-authenticate
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Error::CredentialsMissing { .. } | Error::TokenRefreshFailed { .. }
        )
    }
}
