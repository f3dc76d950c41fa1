//! OAuth 2.0 flow for Google (Gmail) authorization

use std::path::Path;
use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::credentials::{CredentialStore, OAuthTokens};
use crate::error::{Error, Result};

/// Google authorization endpoint
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google token endpoint
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google OAuth client configuration
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    /// OAuth client ID
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: String,

    /// Redirect URI for the OAuth callback
    pub redirect_uri: String,

    /// Consent page URL
    pub auth_uri: String,

    /// Code/refresh exchange URL
    pub token_uri: String,

    /// Scopes to request
    pub scopes: Vec<String>,
}

/// Client secrets JSON as downloaded from the Google Cloud console
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    web: Option<ClientSecrets>,
    installed: Option<ClientSecrets>,
}

#[derive(Debug, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl GoogleOAuthConfig {
    /// Load client credentials from a Google client secrets file
    pub fn from_client_secrets_file(
        path: &Path,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read client secrets {:?}: {}", path, e))
        })?;
        Self::from_client_secrets_json(&contents, redirect_uri, scopes)
    }

    /// Parse client credentials from client secrets JSON (`web` or `installed`)
    pub fn from_client_secrets_json(
        contents: &str,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Result<Self> {
        let file: ClientSecretsFile = serde_json::from_str(contents)?;
        let secrets = file
            .web
            .or(file.installed)
            .ok_or_else(|| {
                Error::Config("Client secrets must contain `web` or `installed`".to_string())
            })?;

        Ok(Self {
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
            redirect_uri: redirect_uri.into(),
            auth_uri: secrets.auth_uri.unwrap_or_else(|| AUTH_URL.to_string()),
            token_uri: secrets.token_uri.unwrap_or_else(|| TOKEN_URL.to_string()),
            scopes,
        })
    }
}

/// Response from the Google token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: String,
    pub scope: Option<String>,
}

/// Error body from the Google token endpoint
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
}

/// Whether Google rejected the refresh token itself (revoked or expired grant)
///
/// Other failures surface as [`Error::OAuth`].
fn is_grant_rejected(status: reqwest::StatusCode, body: &str) -> bool {
    matches!(status.as_u16(), 400 | 401)
        && serde_json::from_str::<TokenErrorResponse>(body)
            .map(|e| e.error == "invalid_grant")
            .unwrap_or(false)
}

/// OAuth manager: builds consent URLs, exchanges codes, keeps tokens fresh
pub struct OAuthManager {
    config: GoogleOAuthConfig,
    client: Client,
    store: Arc<dyn CredentialStore>,
}

impl OAuthManager {
    /// Create a new OAuth manager backed by a credential store
    pub fn new(config: GoogleOAuthConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            config,
            client: Client::new(),
            store,
        }
    }

    /// Generate the consent URL for a given state
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let scopes = self.config.scopes.join(" ");
        let url = url::Url::parse_with_params(
            &self.config.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", scopes.as_str()),
                ("state", state),
                ("access_type", "offline"),
                ("include_granted_scopes", "true"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| Error::Config(format!("Invalid auth_uri: {}", e)))?;
        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthTokens> {
        info!("Exchanging authorization code for tokens");

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .client
            .post(&self.config.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token exchange failed: {} - {}", status, body);
            return Err(Error::OAuth(format!(
                "Token exchange failed: {} - {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        debug!("Token exchange successful");

        Ok(self.tokens_from_response(token_response, None))
    }

    /// Refresh a user's access token and persist the result
    pub async fn refresh(&self, user_id: &str, current: OAuthTokens) -> Result<OAuthTokens> {
        let refresh_token = current
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::CredentialsMissing {
                user_id: user_id.to_string(),
            })?;

        debug!("Refreshing access token for {}", user_id);

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(&self.config.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Token refresh failed for {}: {} - {}", user_id, status, body);
            if is_grant_rejected(status, &body) {
                return Err(Error::TokenRefreshFailed {
                    user_id: user_id.to_string(),
                    reason: format!("{} - {}", status, body),
                });
            }
            return Err(Error::OAuth(format!(
                "Token refresh failed: {} - {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        let tokens = self.tokens_from_response(token_response, Some(current));

        self.store.store_tokens(user_id, &tokens).await?;
        info!("Refreshed access token for {}", user_id);

        Ok(tokens)
    }

    /// Get a valid access token for a user, refreshing if necessary
    pub async fn valid_access_token(&self, user_id: &str) -> Result<String> {
        let tokens = self
            .store
            .get_tokens(user_id)
            .await?
            .ok_or_else(|| Error::CredentialsMissing {
                user_id: user_id.to_string(),
            })?;

        if tokens.is_expired() {
            info!("Token expired for {}, refreshing...", user_id);
            let tokens = self.refresh(user_id, tokens).await?;
            Ok(tokens.access_token)
        } else {
            Ok(tokens.access_token)
        }
    }

    /// Get the credential store
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    fn tokens_from_response(
        &self,
        response: TokenResponse,
        previous: Option<OAuthTokens>,
    ) -> OAuthTokens {
        let expires_at = chrono::Utc::now().timestamp() + response.expires_in;
        let scopes = response
            .scope
            .map(|s| s.split_whitespace().map(String::from).collect())
            .or_else(|| previous.as_ref().map(|p| p.scopes.clone()))
            .unwrap_or_else(|| self.config.scopes.clone());

        OAuthTokens {
            access_token: response.access_token,
            // Google omits the refresh token on refresh; keep the old one.
            refresh_token: response
                .refresh_token
                .or_else(|| previous.and_then(|p| p.refresh_token)),
            expires_at,
            scopes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::FileCredentialStore;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRETS: &str = r#"{
        "web": {
            "client_id": "client-123.apps.googleusercontent.com",
            "client_secret": "shh",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token"
        }
    }"#;

    fn config(token_uri: Option<String>) -> GoogleOAuthConfig {
        let mut config = GoogleOAuthConfig::from_client_secrets_json(
            SECRETS,
            "https://bot.example.com/auth/mail/callback",
            vec!["https://www.googleapis.com/auth/gmail.modify".to_string()],
        )
        .unwrap();
        if let Some(uri) = token_uri {
            config.token_uri = uri;
        }
        config
    }

    #[test]
    fn test_parse_installed_client_secrets() {
        let json = r#"{"installed": {"client_id": "id", "client_secret": "secret"}}"#;
        let config =
            GoogleOAuthConfig::from_client_secrets_json(json, "http://localhost", vec![]).unwrap();
        assert_eq!(config.client_id, "id");
        assert_eq!(config.token_uri, TOKEN_URL);

        let bad = r#"{"other": {}}"#;
        assert!(GoogleOAuthConfig::from_client_secrets_json(bad, "x", vec![]).is_err());
    }

    #[tokio::test]
    async fn test_authorization_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCredentialStore::new(dir.path()).unwrap());
        let oauth = OAuthManager::new(config(None), store);

        let url = oauth.authorization_url("state-xyz").unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(url.contains("client_id=client-123.apps.googleusercontent.com"));
        assert!(url.contains("state=state-xyz"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("include_granted_scopes=true"));
    }

    #[tokio::test]
    async fn test_missing_tokens_are_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCredentialStore::new(dir.path()).unwrap());
        let oauth = OAuthManager::new(config(None), store);

        let err = oauth.valid_access_token("1001").await.unwrap_err();
        assert!(err.is_credentials_missing());
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_stored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh-access",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCredentialStore::new(dir.path()).unwrap());
        store
            .store_tokens(
                "1001",
                &OAuthTokens {
                    access_token: "stale".to_string(),
                    refresh_token: Some("keep-me".to_string()),
                    expires_at: chrono::Utc::now().timestamp() - 10,
                    scopes: vec![],
                },
            )
            .await
            .unwrap();

        let token_uri = format!("{}/token", server.uri());
        let oauth = OAuthManager::new(config(Some(token_uri)), store.clone());
        let token = oauth.valid_access_token("1001").await.unwrap();
        assert_eq!(token, "fresh-access");

        let stored = store.get_tokens("1001").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "fresh-access");
        assert_eq!(stored.refresh_token.as_deref(), Some("keep-me"));
    }

    async fn expired_store(dir: &tempfile::TempDir) -> Arc<FileCredentialStore> {
        let store = Arc::new(FileCredentialStore::new(dir.path()).unwrap());
        store
            .store_tokens(
                "1001",
                &OAuthTokens {
                    access_token: "stale".to_string(),
                    refresh_token: Some("keep-me".to_string()),
                    expires_at: chrono::Utc::now().timestamp() - 10,
                    scopes: vec![],
                },
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_revoked_grant_requires_reauth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = expired_store(&dir).await;
        let oauth = OAuthManager::new(config(Some(format!("{}/token", server.uri()))), store);

        let err = oauth.valid_access_token("1001").await.unwrap_err();
        assert!(matches!(err, Error::TokenRefreshFailed { .. }));
        assert!(err.requires_reauth());
    }

    #[tokio::test]
    async fn test_transient_refresh_failure_is_not_reauth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = expired_store(&dir).await;
        let oauth = OAuthManager::new(config(Some(format!("{}/token", server.uri()))), store);

        let err = oauth.valid_access_token("1001").await.unwrap_err();
        assert!(matches!(err, Error::OAuth(_)));
        assert!(!err.requires_reauth());
    }

    #[test]
    fn test_grant_rejection_needs_invalid_grant() {
        use reqwest::StatusCode;
        let invalid_grant = r#"{"error": "invalid_grant"}"#;
        assert!(is_grant_rejected(StatusCode::BAD_REQUEST, invalid_grant));
        assert!(is_grant_rejected(StatusCode::UNAUTHORIZED, invalid_grant));
        assert!(!is_grant_rejected(StatusCode::BAD_REQUEST, r#"{"error": "invalid_client"}"#));
        assert!(!is_grant_rejected(StatusCode::TOO_MANY_REQUESTS, invalid_grant));
        assert!(!is_grant_rejected(StatusCode::SERVICE_UNAVAILABLE, "backend unavailable"));
    }
}
