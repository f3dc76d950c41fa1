//! Per-user OAuth credential storage
//!
//! The mail provider owns credential state: stored tokens for each chat
//! user and the short-lived anti-forgery states issued by `login`. This
//! module defines the storage trait and the default file-backed store.
//!
//! # Configuration
//!
//! In `config.toml`:
//!
//! ```toml
//! [gmail]
//! token_dir = "/var/lib/mailbridge/tokens"  # optional
//! state_ttl_secs = 600
//! ```

mod file;

pub use file::FileCredentialStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// OAuth tokens stored for a chat user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// Access token for API calls
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token expiry timestamp (Unix seconds)
    pub expires_at: i64,

    /// Granted scopes
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl OAuthTokens {
    /// Check if the access token is expired or will expire within a minute
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.expires_at < now + 60
    }

    /// Whether an expired token can be renewed without the user
    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }
}

/// Trait for credential storage backends
///
/// Implementations must be thread-safe (`Send + Sync`) and must serialise
/// concurrent writes; the bridge handles messages from many users at once.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get tokens for a user
    async fn get_tokens(&self, user_id: &str) -> Result<Option<OAuthTokens>>;

    /// Store tokens for a user, replacing any existing ones
    async fn store_tokens(&self, user_id: &str, tokens: &OAuthTokens) -> Result<()>;

    /// Delete tokens for a user; returns whether anything was deleted
    async fn delete_tokens(&self, user_id: &str) -> Result<bool>;

    /// Remember an OAuth state issued to a user
    async fn save_state(&self, user_id: &str, state: &str, ttl_secs: u64) -> Result<()>;

    /// Consume an OAuth state, returning its user if it was valid
    ///
    /// A state can be consumed once. Expired states are purged as a side
    /// effect and never returned.
    async fn consume_state(&self, state: &str) -> Result<Option<String>>;

    /// Check if tokens exist for a user
    async fn has_tokens(&self, user_id: &str) -> Result<bool> {
        Ok(self.get_tokens(user_id).await?.is_some())
    }
}
