//! Text/JSON completion service
//!
//! The command pipeline asks the completion service for two things: a JSON
//! object matching the command schema, and a short free-text reply when no
//! command could be resolved. [`AiBackend`] records whether a client could be
//! built at all, so callers can tell "unavailable" apart from "failed".

mod anthropic;

pub use anthropic::AnthropicClient;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::AiConfig;
use crate::error::{Error, Result};

/// A completion result
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Free text (no schema requested)
    Text(String),
    /// Parsed JSON (schema requested)
    Json(Value),
}

/// Completion service client
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a response to `input`
    ///
    /// With a `schema`, the reply must be JSON and is returned as
    /// [`Completion::Json`]; otherwise it is returned as [`Completion::Text`].
    async fn generate_response(
        &self,
        input: &str,
        system_prompt: Option<&str>,
        schema: Option<&Value>,
    ) -> Result<Completion>;
}

/// Completion client, or the reason none could be built
#[derive(Clone)]
pub enum AiBackend {
    Ready(Arc<dyn CompletionClient>),
    Unavailable(String),
}

impl AiBackend {
    /// The client, or [`Error::AiUnavailable`]
    pub fn client(&self) -> Result<Arc<dyn CompletionClient>> {
        match self {
            AiBackend::Ready(client) => Ok(client.clone()),
            AiBackend::Unavailable(reason) => Err(Error::AiUnavailable(reason.clone())),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, AiBackend::Ready(_))
    }
}

impl std::fmt::Debug for AiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiBackend::Ready(_) => f.write_str("AiBackend::Ready"),
            AiBackend::Unavailable(reason) => write!(f, "AiBackend::Unavailable({})", reason),
        }
    }
}

/// Build the completion backend from configuration
///
/// A missing API key or client construction failure yields
/// [`AiBackend::Unavailable`] rather than an error; the bridge keeps working
/// with the rule-based parser.
pub fn create_backend(config: &AiConfig) -> AiBackend {
    let api_key = match std::env::var(&config.api_key_env) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            let reason = format!("{} is not set", config.api_key_env);
            warn!("Completion service unavailable: {}", reason);
            return AiBackend::Unavailable(reason);
        }
    };

    match AnthropicClient::new(api_key, config) {
        Ok(client) => {
            info!(model = %config.model, "Completion service configured");
            AiBackend::Ready(Arc::new(client))
        }
        Err(e) => {
            warn!("Failed to create completion client: {}", e);
            AiBackend::Unavailable(e.to_string())
        }
    }
}
