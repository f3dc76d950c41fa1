//! Reply formatting and chunking

use crate::models::MailMessage;

/// Default per-message character budget
pub const DEFAULT_CHUNK_LIMIT: usize = 1900;

/// Reply for an empty listing
pub const NO_MESSAGES: &str = "No messages found.";

/// Compact one-line rendering for listings
pub fn format_summary_line(msg: &MailMessage) -> String {
    format!(
        "{} | {} | {} | {} | {}",
        msg.id, msg.date, msg.from, msg.subject, msg.snippet
    )
}

/// Multi-line summary view used when listing messages
pub fn format_entry(msg: &MailMessage) -> String {
    format!(
        "ID: {}\nSubject: {}\nFrom: {}\nDate: {}\nSnippet: {}",
        msg.id,
        clean_text(&msg.subject),
        clean_text(&msg.from),
        clean_text(&msg.date),
        clean_text(&msg.snippet),
    )
}

/// Full view of a fetched message
pub fn format_detail(msg: &MailMessage) -> String {
    format!(
        "{}\nFrom: {}\nTo: {}\n\n{}",
        msg.subject, msg.from, msg.to, msg.body
    )
}

fn clean_text(text: &str) -> String {
    html_escape::decode_html_entities(text).trim().to_string()
}

/// Split `text` into chunks of whole lines
///
/// Lines accumulate while the running length (characters plus one newline
/// per line) stays within `limit`. A line longer than `limit` gets a chunk
/// of its own and is never split. Joining the chunks with `"\n"` gives back
/// `text`; empty input gives no chunks.
pub fn chunk(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count() + 1;
        if !current.is_empty() && current_len + line_len > limit {
            chunks.push(current.join("\n"));
            current.clear();
            current_len = 0;
        }
        current.push(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }

    chunks
}
