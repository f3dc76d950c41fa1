//! Gmail API payload parsing

use std::collections::HashMap;

use base64::alphabet::URL_SAFE;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::Deserialize;
use tracing::warn;

use crate::models::MailMessage;

/// Gmail bodies are URL-safe base64, sometimes unpadded
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Width used when rendering HTML-only bodies as text
const HTML_RENDER_WIDTH: usize = 100;

/// `users.messages.list` response
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
}

/// An id entry from a listing
#[derive(Debug, Deserialize)]
pub(crate) struct MessageRef {
    #[serde(default)]
    pub id: Option<String>,
}

/// `users.messages.get` response
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageResource {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub payload: MessagePart,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: PartBody,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Header {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Convert a Gmail message resource into a [`MailMessage`]
pub(crate) fn parse_message(resource: MessageResource, include_body: bool) -> MailMessage {
    let headers = extract_headers(&resource.payload);
    let body = if include_body {
        extract_body(&resource.payload)
    } else {
        String::new()
    };
    let header = |name: &str| headers.get(name).cloned().unwrap_or_default();

    MailMessage {
        id: resource.id,
        from: header("from"),
        to: header("to"),
        date: header("date"),
        subject: header("subject"),
        snippet: resource.snippet,
        body,
    }
}

/// Top-level headers keyed by lowercase name
pub(crate) fn extract_headers(payload: &MessagePart) -> HashMap<String, String> {
    payload
        .headers
        .iter()
        .filter(|h| !h.name.is_empty())
        .map(|h| (h.name.to_lowercase(), h.value.clone()))
        .collect()
}

/// Body text: top-level data, else first text/plain, else first text/html
pub(crate) fn extract_body(payload: &MessagePart) -> String {
    if let Some(data) = payload.body.data.as_deref().filter(|d| !d.is_empty()) {
        let decoded = decode_body(data);
        return if payload.mime_type == "text/html" {
            html_to_text(&decoded)
        } else {
            decoded
        };
    }

    if let Some(data) = find_part(payload, "text/plain") {
        return decode_body(data);
    }
    if let Some(data) = find_part(payload, "text/html") {
        return html_to_text(&decode_body(data));
    }
    String::new()
}

/// Depth-first search for the first part of `mime_type` carrying data
pub(crate) fn find_part<'a>(payload: &'a MessagePart, mime_type: &str) -> Option<&'a str> {
    for part in &payload.parts {
        if part.mime_type == mime_type {
            if let Some(data) = part.body.data.as_deref().filter(|d| !d.is_empty()) {
                return Some(data);
            }
        }
        if let Some(nested) = find_part(part, mime_type) {
            return Some(nested);
        }
    }
    None
}

/// Decode URL-safe base64 with lossy UTF-8; undecodable input yields ""
pub(crate) fn decode_body(data: &str) -> String {
    match BODY_ENGINE.decode(data.trim()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!("Failed to decode message body: {}", e);
            String::new()
        }
    }
}

fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), HTML_RENDER_WIDTH) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to render HTML body: {}", e);
            html.to_string()
        }
    }
}
