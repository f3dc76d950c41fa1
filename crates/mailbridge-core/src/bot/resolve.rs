//! Command resolution: extraction first, then the rule-based parser

use tracing::debug;

use crate::ai::AiBackend;
use crate::models::Command;

use super::extract::{extract, Extraction};
use super::parser::parse_fallback;

/// Result of resolving one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A validated command to dispatch
    Command(Command),
    /// Nothing resolved; extraction reported why
    Failed(String),
    /// Nothing resolved and no failure was reported
    Nothing,
}

impl Resolution {
    pub fn command(&self) -> Option<&Command> {
        match self {
            Resolution::Command(command) => Some(command),
            _ => None,
        }
    }

    /// The extraction failure, if that is why nothing resolved
    pub fn reason(&self) -> Option<&str> {
        match self {
            Resolution::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Resolve `text` to a command
///
/// Extraction wins when it produces a command. Otherwise the rule-based
/// parser gets a try, and its result suppresses any extraction failure.
pub async fn resolve(backend: &AiBackend, text: &str) -> Resolution {
    let reason = match extract(backend, text).await {
        Extraction::Command(command) => return Resolution::Command(command),
        Extraction::NoIntent => None,
        Extraction::Failed(reason) => {
            debug!(reason = %reason, "Extraction failed, trying rule-based parser");
            Some(reason)
        }
    };

    if let Some(command) = parse_fallback(text) {
        return Resolution::Command(command);
    }

    match reason {
        Some(reason) => Resolution::Failed(reason),
        None => Resolution::Nothing,
    }
}
