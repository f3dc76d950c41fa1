//! Gmail REST API client

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use tracing::{debug, info};

use crate::config::GmailConfig;
use crate::credentials::{CredentialStore, FileCredentialStore};
use crate::error::{Error, Result};
use crate::models::{AuthorizationRequest, AuthorizedUser, MailMessage};
use crate::oauth::{GoogleOAuthConfig, OAuthManager};

use super::parse::{parse_message, ListResponse, MessageResource};
use super::{MailClient, MailClientFactory};

/// Headers requested for listing summaries
const SUMMARY_HEADERS: [&str; 4] = ["From", "To", "Date", "Subject"];

/// Gmail client bound to one chat user
pub struct GmailClient {
    user_id: RwLock<String>,
    oauth: Arc<OAuthManager>,
    http: Client,
    api_base: String,
    state_ttl_secs: u64,
}

impl GmailClient {
    /// Create a client for `user_id`
    pub fn new(
        user_id: impl Into<String>,
        oauth: Arc<OAuthManager>,
        http: Client,
        config: &GmailConfig,
    ) -> Self {
        Self {
            user_id: RwLock::new(user_id.into()),
            oauth,
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            state_ttl_secs: config.state_ttl_secs,
        }
    }

    /// The user this client currently acts for
    pub fn user_id(&self) -> String {
        self.user_id.read().clone()
    }

    fn store(&self) -> &Arc<dyn CredentialStore> {
        self.oauth.store()
    }

    fn messages_url(&self, suffix: &str) -> String {
        format!("{}/users/me/messages{}", self.api_base, suffix)
    }

    /// Build an authorized request for the current user
    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let user_id = self.user_id();
        let token = self.oauth.valid_access_token(&user_id).await?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Send a request and map non-success statuses to errors
    async fn send(
        &self,
        request: RequestBuilder,
        message_id: Option<&str>,
    ) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match (status, message_id) {
            (StatusCode::NOT_FOUND, Some(id)) => Err(Error::MessageNotFound(id.to_string())),
            (StatusCode::UNAUTHORIZED, _) => Err(Error::CredentialsMissing {
                user_id: self.user_id(),
            }),
            _ => Err(Error::MailApi {
                status: status.as_u16(),
                message: body,
            }),
        }
    }

    async fn fetch(&self, message_id: &str, format: &str) -> Result<MessageResource> {
        let url = self.messages_url(&format!("/{}", urlencoding::encode(message_id)));
        let mut query: Vec<(&str, &str)> = vec![("format", format)];
        if format == "metadata" {
            query.extend(SUMMARY_HEADERS.iter().map(|h| ("metadataHeaders", *h)));
        }
        let request = self.request(Method::GET, &url).await?.query(&query);
        Ok(self.send(request, Some(message_id)).await?.json().await?)
    }
}

#[async_trait]
impl MailClient for GmailClient {
    fn provider_name(&self) -> &str {
        "Gmail"
    }

    async fn login(&self) -> Result<AuthorizationRequest> {
        let user_id = self.user_id();
        if user_id.is_empty() {
            return Err(Error::InvalidRequest("user_id is required for login".to_string()));
        }

        let state = uuid::Uuid::new_v4().simple().to_string();
        let authorization_url = self.oauth.authorization_url(&state)?;
        self.store()
            .save_state(&user_id, &state, self.state_ttl_secs)
            .await?;
        debug!(user_id = %user_id, "Issued authorization state");

        Ok(AuthorizationRequest {
            authorization_url,
            state,
        })
    }

    async fn callback(&self, code: &str, state: Option<&str>) -> Result<AuthorizedUser> {
        let state = state
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::InvalidRequest("Missing OAuth state".to_string()))?;

        let user_id = self
            .store()
            .consume_state(state)
            .await?
            .ok_or(Error::InvalidOAuthState)?;
        *self.user_id.write() = user_id.clone();

        let tokens = self.oauth.exchange_code(code).await?;
        self.store().store_tokens(&user_id, &tokens).await?;
        info!(user_id = %user_id, "Stored Gmail credentials");

        Ok(AuthorizedUser { user_id })
    }

    async fn logout(&self) -> Result<bool> {
        self.store().delete_tokens(&self.user_id()).await
    }

    async fn get_messages(&self, max_results: u32) -> Result<Vec<MailMessage>> {
        let url = self.messages_url("");
        let max = max_results.to_string();
        let request = self
            .request(Method::GET, &url)
            .await?
            .query(&[("maxResults", max.as_str())]);
        let listing: ListResponse = self.send(request, None).await?.json().await?;

        let mut messages = Vec::with_capacity(listing.messages.len());
        for id in listing.messages.into_iter().filter_map(|m| m.id) {
            let resource = self.fetch(&id, "metadata").await?;
            messages.push(parse_message(resource, false));
        }
        debug!(count = messages.len(), "Listed messages");
        Ok(messages)
    }

    async fn get_message(&self, message_id: &str) -> Result<MailMessage> {
        let resource = self.fetch(message_id, "full").await?;
        Ok(parse_message(resource, true))
    }

    async fn delete_message(&self, message_id: &str) -> Result<bool> {
        let url = self.messages_url(&format!("/{}", urlencoding::encode(message_id)));
        let request = self.request(Method::DELETE, &url).await?;
        self.send(request, Some(message_id)).await?;
        Ok(true)
    }

    async fn mark_as_read(&self, message_id: &str) -> Result<bool> {
        let url = self.messages_url(&format!("/{}/modify", urlencoding::encode(message_id)));
        let request = self
            .request(Method::POST, &url)
            .await?
            .json(&serde_json::json!({ "removeLabelIds": ["UNREAD"] }));
        self.send(request, Some(message_id)).await?;
        Ok(true)
    }
}

/// Builds [`GmailClient`]s that share one OAuth manager and HTTP client
pub struct GmailClientFactory {
    oauth: Arc<OAuthManager>,
    http: Client,
    config: GmailConfig,
}

impl GmailClientFactory {
    /// Create a factory from explicit parts
    pub fn new(oauth: Arc<OAuthManager>, config: GmailConfig) -> Self {
        Self {
            oauth,
            http: Client::new(),
            config,
        }
    }

    /// Create a factory from configuration, using the file credential store
    pub fn from_config(config: &GmailConfig, token_dir: &std::path::Path) -> Result<Self> {
        let credentials_path = config.credentials_path.as_ref();
        let redirect_uri = config.redirect_uri.as_ref();
        let (Some(credentials_path), Some(redirect_uri)) = (credentials_path, redirect_uri) else {
            return Err(Error::Config(
                "GMAIL_CREDENTIALS_PATH and GMAIL_REDIRECT_URI must be set".to_string(),
            ));
        };

        let oauth_config = GoogleOAuthConfig::from_client_secrets_file(
            credentials_path,
            redirect_uri.clone(),
            config.scopes.clone(),
        )?;
        let store: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(token_dir)?);
        let oauth = Arc::new(OAuthManager::new(oauth_config, store));
        Ok(Self::new(oauth, config.clone()))
    }
}

impl MailClientFactory for GmailClientFactory {
    fn client_for(&self, user_id: &str) -> Result<Arc<dyn MailClient>> {
        Ok(Arc::new(GmailClient::new(
            user_id,
            self.oauth.clone(),
            self.http.clone(),
            &self.config,
        )))
    }
}
