//! Anthropic Messages API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::AiConfig;
use crate::error::{Error, Result};

use super::{Completion, CompletionClient};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Client for the Anthropic Messages API
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(api_key: String, config: &AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::AiUnavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

/// Join the caller's prompt with the strict-JSON directive for `schema`
fn system_text(system_prompt: Option<&str>, schema: Option<&Value>) -> Option<String> {
    let mut directives = Vec::new();
    if let Some(prompt) = system_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        directives.push(prompt.to_string());
    }
    if let Some(schema) = schema {
        directives.push(format!(
            "You must return JSON that strictly conforms to the following schema:\n{}\n\
             Do not include any extra text, only valid JSON.",
            schema
        ));
    }
    (!directives.is_empty()).then(|| directives.join("\n\n"))
}

#[async_trait]
impl CompletionClient for AnthropicClient {
    async fn generate_response(
        &self,
        input: &str,
        system_prompt: Option<&str>,
        schema: Option<&Value>,
    ) -> Result<Completion> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: system_text(system_prompt, schema),
            messages: vec![RequestMessage {
                role: "user",
                content: input,
            }],
        };

        debug!(model = %self.model, structured = schema.is_some(), "Requesting completion");

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::AiRequest(format!("Completion request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AiRequest(format!(
                "Completion service returned {}: {}",
                status, body
            )));
        }

        let result: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::AiResponse(format!("Failed to parse completion response: {}", e)))?;

        let content = result
            .content
            .into_iter()
            .find_map(|block| block.text)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| Error::AiResponse("Completion response had no text".to_string()))?;

        if schema.is_none() {
            return Ok(Completion::Text(content));
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(value) if value.is_object() => Ok(Completion::Json(value)),
            Ok(_) => Err(Error::AiResponse(
                "Completion returned data that does not match the expected schema".to_string(),
            )),
            Err(_) => Err(Error::AiResponse(
                "Completion returned invalid JSON for the provided schema".to_string(),
            )),
        }
    }
}
