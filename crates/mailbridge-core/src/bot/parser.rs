//! Rule-based command parser
//!
//! A small fixed grammar used when intent extraction yields nothing:
//!
//! | Input                               | Command          |
//! |-------------------------------------|------------------|
//! | `login`, `login gmail`, `link gmail`     | `login`          |
//! | `logout`, `logout gmail`, `unlink gmail` | `logout`         |
//! | `get <N> mail`                      | `get_messages`   |
//! | `get mail <id>`                     | `get_message`    |
//! | `delete mail <id>`                  | `delete_message` |
//! | `read mail <id>`                    | `mark_as_read`   |
//!
//! Matching is case-insensitive after trimming. Patterns are anchored at the
//! start of the input only, so trailing words are ignored. Message ids keep
//! their original case.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Command;

const LOGIN_PHRASES: [&str; 3] = ["login", "login gmail", "link gmail"];
const LOGOUT_PHRASES: [&str; 3] = ["logout", "logout gmail", "unlink gmail"];

static GET_MESSAGES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^get\s+(\d+)\s+mail").unwrap());
static GET_MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^get\s+mail\s+(\S+)").unwrap());
static DELETE_MESSAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^delete\s+mail\s+(\S+)").unwrap());
static MARK_AS_READ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^read\s+mail\s+(\S+)").unwrap());

/// Parse `text` against the fixed grammar; `None` when nothing matches
pub fn parse_fallback(text: &str) -> Option<Command> {
    let text = text.trim();
    let lowered = text.to_lowercase();

    if LOGIN_PHRASES.contains(&lowered.as_str()) {
        return Some(Command::login());
    }
    if LOGOUT_PHRASES.contains(&lowered.as_str()) {
        return Some(Command::logout());
    }

    if let Some(caps) = GET_MESSAGES.captures(text) {
        // Zero or out-of-range counts are not a valid request.
        return caps[1]
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .map(Command::get_messages);
    }

    let capture = |re: &Regex| re.captures(text).map(|caps| caps[1].to_string());
    if let Some(id) = capture(&GET_MESSAGE) {
        return Some(Command::get_message(id));
    }
    if let Some(id) = capture(&DELETE_MESSAGE) {
        return Some(Command::delete_message(id));
    }
    if let Some(id) = capture(&MARK_AS_READ) {
        return Some(Command::mark_as_read(id));
    }

    None
}
