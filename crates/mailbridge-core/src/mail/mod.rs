//! Mail provider abstraction
//!
//! The bridge talks to the mail provider only through [`MailClient`]. A
//! [`MailClientFactory`] hands out a client bound to one chat user; the
//! provider owns token storage and OAuth state for that user.

mod gmail;
mod parse;

pub use gmail::{GmailClient, GmailClientFactory};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{AuthorizationRequest, AuthorizedUser, MailMessage};

/// Mail operations on behalf of one user
///
/// Mailbox operations are scoped to the user the client is currently bound
/// to. `callback` rebinds the client to the user the OAuth state was issued
/// for. Missing credentials surface as
/// [`Error::CredentialsMissing`](crate::error::Error::CredentialsMissing).
#[async_trait]
pub trait MailClient: Send + Sync {
    /// Human-readable provider name (e.g. "Gmail")
    fn provider_name(&self) -> &str;

    /// Start the provider's authorization flow
    async fn login(&self) -> Result<AuthorizationRequest>;

    /// Finish the authorization flow with the provider's callback values
    async fn callback(&self, code: &str, state: Option<&str>) -> Result<AuthorizedUser>;

    /// Remove stored credentials for the current user
    async fn logout(&self) -> Result<bool>;

    /// List recent messages (summaries; bodies may be empty)
    async fn get_messages(&self, max_results: u32) -> Result<Vec<MailMessage>>;

    /// Fetch one message including its body
    async fn get_message(&self, message_id: &str) -> Result<MailMessage>;

    /// Delete a message
    async fn delete_message(&self, message_id: &str) -> Result<bool>;

    /// Mark a message as read
    async fn mark_as_read(&self, message_id: &str) -> Result<bool>;
}

/// Produces mail clients bound to a chat user
pub trait MailClientFactory: Send + Sync {
    /// Get a client for `user_id` (empty when the user is not yet known,
    /// e.g. while handling an OAuth callback)
    fn client_for(&self, user_id: &str) -> Result<Arc<dyn MailClient>>;
}
