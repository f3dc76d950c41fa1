//! Conversational fallback when no command resolves

use tracing::warn;

use crate::ai::{AiBackend, Completion};

/// Instructions for the free-text fallback reply
pub const FALLBACK_PROMPT: &str = "You are a helpful Gmail assistant in Discord DMs. \
Reply naturally and briefly. \
If the request is unclear, ask a short follow-up question. \
Do not mention internal schemas or tools.";

/// Fallback instructions, with the parse failure appended as context
pub fn fallback_prompt(reason: Option<&str>) -> String {
    match reason {
        Some(reason) => format!("{} Parsing failed because: {}", FALLBACK_PROMPT, reason),
        None => FALLBACK_PROMPT.to_string(),
    }
}

/// Ask the completion service for a free-text reply
///
/// Returns `None` when the service is unavailable, fails, or answers with
/// anything other than non-blank text.
pub async fn fallback_reply(
    backend: &AiBackend,
    text: &str,
    reason: Option<&str>,
) -> Option<String> {
    let client = backend.client().ok()?;
    let prompt = fallback_prompt(reason);

    match client.generate_response(text, Some(&prompt), None).await {
        Ok(Completion::Text(reply)) if !reply.trim().is_empty() => Some(reply),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "Fallback reply failed");
            None
        }
    }
}
