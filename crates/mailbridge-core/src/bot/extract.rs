//! Intent extraction through the completion service

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::ai::{AiBackend, Completion};
use crate::models::{Action, Command};

/// Instructions for the structured extraction call
pub const EXTRACTION_PROMPT: &str = "You are a Gmail assistant command parser. \
Return JSON only that matches the schema. No extra text. \
Map user intent to one of: login, logout, get_messages, get_message, delete_message, mark_as_read. \
If user asks for latest/recent/last emails, use get_messages. \
If user mentions a number, map to max_results (default 10 if omitted). \
If user provides an id, map to message_id.";

/// Outcome of an extraction attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// A validated command
    Command(Command),
    /// The service answered but named no action
    NoIntent,
    /// The service could not be used or its answer was unusable
    Failed(String),
}

/// JSON schema mirroring [`Command`]
pub fn command_schema() -> Value {
    let actions: Vec<&str> = Action::ALL.iter().map(Action::as_str).collect();
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "enum": actions},
            "max_results": {"type": "integer"},
            "message_id": {"type": "string"}
        },
        "required": ["action"]
    })
}

/// Ask the completion service to turn `text` into a command
pub async fn extract(backend: &AiBackend, text: &str) -> Extraction {
    let client = match backend.client() {
        Ok(client) => client,
        Err(e) => return Extraction::Failed(format!("AI client unavailable: {}", e)),
    };

    let schema = command_schema();
    match client
        .generate_response(text, Some(EXTRACTION_PROMPT), Some(&schema))
        .await
    {
        Ok(Completion::Json(value)) => command_from_value(&value),
        Ok(Completion::Text(_)) => Extraction::Failed(NOT_AN_OBJECT.to_string()),
        Err(e) => Extraction::Failed(format!("AI parsing error: {}", e)),
    }
}

const NOT_AN_OBJECT: &str = "AI response did not match expected JSON object";

/// Validate and normalise a structured response
pub fn command_from_value(value: &Value) -> Extraction {
    let Some(object) = value.as_object() else {
        return Extraction::Failed(NOT_AN_OBJECT.to_string());
    };
    let Some(action) = object.get("action") else {
        return Extraction::Failed("Parsed result missing required field: action".to_string());
    };

    let action = match action {
        Value::Null => return Extraction::NoIntent,
        Value::String(s) if s.trim().is_empty() => return Extraction::NoIntent,
        Value::String(s) => match s.trim().parse::<Action>() {
            Ok(action) => action,
            Err(reason) => return Extraction::Failed(reason),
        },
        other => return Extraction::Failed(format!("Unrecognized action: {}", other)),
    };

    let max_results = match max_results(object) {
        Ok(n) => n,
        Err(reason) => return Extraction::Failed(reason),
    };
    let message_id = match message_id(object) {
        Ok(id) => id,
        Err(reason) => return Extraction::Failed(reason),
    };

    let command = Command {
        action,
        max_results,
        message_id,
    };
    debug!(action = %command.action, "Extracted command");
    Extraction::Command(command)
}

/// Missing, null and zero all mean "use the default"
fn max_results(object: &Map<String, Value>) -> std::result::Result<Option<u32>, String> {
    let Some(value) = object.get("max_results").filter(|v| !v.is_null()) else {
        return Ok(None);
    };

    let count = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };

    match count {
        Some(n) => Ok((n > 0).then_some(n)),
        None => Err(format!("Invalid max_results: {}", value)),
    }
}

fn message_id(object: &Map<String, Value>) -> std::result::Result<Option<String>, String> {
    match object.get("message_id") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(v) => Err(format!("Invalid message_id: {}", v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCompletion;
    use std::sync::Arc;

    fn ready(fake: FakeCompletion) -> (Arc<FakeCompletion>, AiBackend) {
        let fake = Arc::new(fake);
        (fake.clone(), AiBackend::Ready(fake))
    }

    #[test]
    fn test_schema_lists_every_action() {
        let schema = command_schema();
        assert_eq!(schema["required"], json!(["action"]));
        assert_eq!(
            schema["properties"]["action"]["enum"],
            json!([
                "login",
                "logout",
                "get_messages",
                "get_message",
                "delete_message",
                "mark_as_read"
            ])
        );
    }

    #[test]
    fn test_normalises_fields() {
        assert_eq!(
            command_from_value(&json!({"action": "get_messages", "max_results": 5})),
            Extraction::Command(Command::get_messages(5))
        );
        assert_eq!(
            command_from_value(&json!({"action": "get_messages", "max_results": 0})),
            Extraction::Command(Command::new(Action::GetMessages))
        );
        assert_eq!(
            command_from_value(&json!({"action": "delete_message", "message_id": 42})),
            Extraction::Command(Command::delete_message("42"))
        );
        assert_eq!(
            command_from_value(&json!({"action": "get_messages", "max_results": "3"})),
            Extraction::Command(Command::get_messages(3))
        );
    }

    #[test]
    fn test_invalid_shapes_are_failures() {
        assert_eq!(
            command_from_value(&json!(["login"])),
            Extraction::Failed("AI response did not match expected JSON object".to_string())
        );
        assert_eq!(
            command_from_value(&json!({"max_results": 3})),
            Extraction::Failed("Parsed result missing required field: action".to_string())
        );
        assert_eq!(
            command_from_value(&json!({"action": "send_email"})),
            Extraction::Failed("Unrecognized action: send_email".to_string())
        );
        assert!(matches!(
            command_from_value(&json!({"action": "get_messages", "max_results": -2})),
            Extraction::Failed(reason) if reason.starts_with("Invalid max_results")
        ));
    }

    #[test]
    fn test_null_action_is_no_intent() {
        assert_eq!(command_from_value(&json!({"action": null})), Extraction::NoIntent);
        assert_eq!(command_from_value(&json!({"action": " "})), Extraction::NoIntent);
    }

    #[tokio::test]
    async fn test_unavailable_backend() {
        let backend = AiBackend::Unavailable("ANTHROPIC_API_KEY is not set".to_string());
        assert_eq!(
            extract(&backend, "login").await,
            Extraction::Failed("AI client unavailable: ANTHROPIC_API_KEY is not set".to_string())
        );
    }

    #[tokio::test]
    async fn test_service_error_is_parsing_error() {
        let (_, backend) = ready(FakeCompletion::failing("timed out"));
        assert_eq!(
            extract(&backend, "login").await,
            Extraction::Failed("AI parsing error: timed out".to_string())
        );
    }

    #[tokio::test]
    async fn test_sends_schema_and_prompt() {
        let (fake, backend) = ready(FakeCompletion::json(json!({"action": "login"})));
        assert_eq!(
            extract(&backend, "connect my mail").await,
            Extraction::Command(Command::login())
        );

        let calls = fake.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].input, "connect my mail");
        assert_eq!(calls[0].system_prompt.as_deref(), Some(EXTRACTION_PROMPT));
        assert_eq!(calls[0].schema, Some(command_schema()));
    }
}
