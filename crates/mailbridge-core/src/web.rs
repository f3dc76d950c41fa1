//! HTTP surface for mail authorization
//!
//! - `GET /health` liveness probe
//! - `GET /auth/mail/start?discord_user_id=…` redirects to the consent page
//! - `GET /auth/mail/callback?code=…&state=…` completes authorization

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::mail::MailClientFactory;

/// Page shown once the provider callback succeeds
pub const AUTHORIZED_PAGE: &str = "Mail authorized. You can return to Chat.";

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub mail: Arc<dyn MailClientFactory>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartParams {
    pub discord_user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Handler failure rendered as `400` with the error text
#[derive(Debug)]
pub struct WebError(Error);

impl From<Error> for WebError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        warn!(error = %self.0, "Authorization request failed");
        (StatusCode::BAD_REQUEST, self.0.to_string()).into_response()
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/mail/start", get(auth_start))
        .route("/auth/mail/callback", get(auth_callback))
        .with_state(state)
}

/// Serve `router(state)` on `listener` until `cancel` fires
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Web server listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    info!("Web server stopped");
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn auth_start(
    State(state): State<AppState>,
    Query(params): Query<StartParams>,
) -> std::result::Result<Redirect, WebError> {
    let user_id = params
        .discord_user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Error::InvalidRequest("Missing discord_user_id".to_string()))?;

    let mail = state.mail.client_for(&user_id)?;
    let auth = mail.login().await?;
    info!(user_id = %user_id, "Redirecting to mail consent page");
    Ok(Redirect::temporary(&auth.authorization_url))
}

async fn auth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> std::result::Result<Html<&'static str>, WebError> {
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::InvalidRequest("Missing authorization code".to_string()))?;

    // The user is only known once the state is consumed.
    let mail = state.mail.client_for("")?;
    let user = mail.callback(&code, params.state.as_deref()).await?;
    info!(user_id = %user.user_id, "Mail authorized");
    Ok(Html(AUTHORIZED_PAGE))
}
