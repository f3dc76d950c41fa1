//! Action dispatcher
//!
//! Runs a resolved [`Command`] against a [`MailClient`] and produces the
//! reply chunks to send back. Each command yields exactly one reply, or one
//! sequence of chunks for message listings and bodies.
//!
//! Failure handling:
//! - a command missing its `message_id` gets [`MISSING_MESSAGE_ID`] and no
//!   mail call is made
//! - [`Error::CredentialsMissing`] and [`Error::TokenRefreshFailed`] are
//!   recovered by starting a new login and replying with the authorization
//!   link
//! - any other error is logged and reported as `Error: {message}`

use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::mail::MailClient;
use crate::models::{Action, Command};

use super::format::{chunk, format_detail, format_entry, format_summary_line, NO_MESSAGES};

/// Reply for a command that needs a message id but has none
pub const MISSING_MESSAGE_ID: &str = "Missing message id.";

/// Executes commands and renders their replies
#[derive(Debug, Clone)]
pub struct Dispatcher {
    default_max_results: u32,
    chunk_limit: usize,
}

impl Dispatcher {
    pub fn new(default_max_results: u32, chunk_limit: usize) -> Self {
        Self {
            default_max_results,
            chunk_limit,
        }
    }

    /// Execute `command` for the user behind `mail`; never fails
    pub async fn execute(&self, mail: &dyn MailClient, command: &Command) -> Vec<String> {
        if command.action.requires_message_id() && command.message_id().is_none() {
            return vec![MISSING_MESSAGE_ID.to_string()];
        }

        match self.run(mail, command).await {
            Ok(replies) => replies,
            Err(e) => self.recover(mail, command.action, e).await,
        }
    }

    async fn run(&self, mail: &dyn MailClient, command: &Command) -> Result<Vec<String>> {
        let provider = mail.provider_name();
        let message_id = command.message_id().unwrap_or_default();

        match command.action {
            Action::Login => {
                let auth = mail.login().await?;
                Ok(vec![format!(
                    "Open this link to authorize {}:\n{}",
                    provider, auth.authorization_url
                )])
            }
            Action::Logout => {
                mail.logout().await?;
                Ok(vec![format!("Logged out from {}.", provider)])
            }
            Action::GetMessages => {
                let max_results = command.max_results_or(self.default_max_results);
                let messages = mail.get_messages(max_results).await?;
                if messages.is_empty() {
                    return Ok(vec![NO_MESSAGES.to_string()]);
                }
                Ok(messages
                    .iter()
                    .inspect(|msg| debug!(summary = %format_summary_line(msg), "Listed message"))
                    .flat_map(|msg| chunk(&format_entry(msg), self.chunk_limit))
                    .collect())
            }
            Action::GetMessage => {
                let msg = mail.get_message(message_id).await?;
                Ok(chunk(&format_detail(&msg), self.chunk_limit))
            }
            Action::DeleteMessage => {
                mail.delete_message(message_id).await?;
                Ok(vec!["Message deleted.".to_string()])
            }
            Action::MarkAsRead => {
                mail.mark_as_read(message_id).await?;
                Ok(vec!["Message marked as read.".to_string()])
            }
        }
    }

    async fn recover(&self, mail: &dyn MailClient, action: Action, err: Error) -> Vec<String> {
        if !err.requires_reauth() {
            error!(action = %action, error = %err, "Command failed");
            return vec![format!("Error: {}", err)];
        }

        warn!(action = %action, error = %err, "Authorization needed, issuing login link");
        match mail.login().await {
            Ok(auth) => {
                info!(action = %action, "Sent authorization link instead of result");
                vec![format!(
                    "Please login to {} first:\n{}",
                    mail.provider_name(),
                    auth.authorization_url
                )]
            }
            Err(e) => {
                error!(action = %action, error = %e, "Login after missing credentials failed");
                vec![format!("Error: {}", e)]
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(crate::models::DEFAULT_MAX_RESULTS, super::format::DEFAULT_CHUNK_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MailMessage;
    use crate::testing::{FakeMail, MailFailure, FAKE_AUTH_URL};

    fn dispatcher() -> Dispatcher {
        Dispatcher::default()
    }

    #[tokio::test]
    async fn test_login_reply_contains_url() {
        let mail = FakeMail::new();
        let replies = dispatcher().execute(&mail, &Command::login()).await;
        assert_eq!(
            replies,
            vec![format!("Open this link to authorize Gmail:\n{}", FAKE_AUTH_URL)]
        );
        assert_eq!(mail.calls(), vec!["login"]);
    }

    #[tokio::test]
    async fn test_logout() {
        let mail = FakeMail::new();
        let replies = dispatcher().execute(&mail, &Command::logout()).await;
        assert_eq!(replies, vec!["Logged out from Gmail."]);
        assert_eq!(mail.calls(), vec!["logout"]);
    }

    #[tokio::test]
    async fn test_missing_message_id_makes_no_call() {
        let mail = FakeMail::new();
        for action in [Action::GetMessage, Action::DeleteMessage, Action::MarkAsRead] {
            let replies = dispatcher().execute(&mail, &Command::new(action)).await;
            assert_eq!(replies, vec![MISSING_MESSAGE_ID]);

            let blank = Command {
                message_id: Some("   ".to_string()),
                ..Command::new(action)
            };
            assert_eq!(dispatcher().execute(&mail, &blank).await, vec![MISSING_MESSAGE_ID]);
        }
        assert!(mail.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_messages_uses_default_count() {
        let mail = FakeMail::new();
        dispatcher()
            .execute(&mail, &Command::new(Action::GetMessages))
            .await;
        assert_eq!(mail.calls(), vec!["get_messages:10"]);
    }

    #[tokio::test]
    async fn test_get_messages_one_entry_per_message() {
        let mail = FakeMail::with_messages(vec![
            MailMessage {
                id: "a".to_string(),
                subject: "First".to_string(),
                ..Default::default()
            },
            MailMessage {
                id: "b".to_string(),
                subject: "Second".to_string(),
                ..Default::default()
            },
        ]);
        let replies = dispatcher().execute(&mail, &Command::get_messages(2)).await;
        assert_eq!(replies.len(), 2);
        assert!(replies[0].starts_with("ID: a\nSubject: First"));
        assert!(replies[1].starts_with("ID: b\nSubject: Second"));
        assert_eq!(mail.calls(), vec!["get_messages:2"]);
    }

    #[tokio::test]
    async fn test_empty_listing() {
        let mail = FakeMail::new();
        let replies = dispatcher().execute(&mail, &Command::get_messages(3)).await;
        assert_eq!(replies, vec![NO_MESSAGES]);
    }

    #[tokio::test]
    async fn test_long_body_is_chunked() {
        let body = (0..30)
            .map(|i| format!("line {} {}", i, "z".repeat(20)))
            .collect::<Vec<_>>()
            .join("\n");
        let mail = FakeMail::with_messages(vec![MailMessage {
            id: "m1".to_string(),
            subject: "Report".to_string(),
            body,
            ..Default::default()
        }]);

        let replies = Dispatcher::new(10, 100)
            .execute(&mail, &Command::get_message("m1"))
            .await;
        assert!(replies.len() > 1);
        assert!(replies[0].starts_with("Report\nFrom: "));
        assert!(replies.iter().all(|r| r.chars().count() <= 100));
        assert_eq!(mail.calls(), vec!["get_message:m1"]);
    }

    #[tokio::test]
    async fn test_delete_and_mark_read() {
        let mail = FakeMail::new();
        assert_eq!(
            dispatcher().execute(&mail, &Command::delete_message("42")).await,
            vec!["Message deleted."]
        );
        assert_eq!(
            dispatcher().execute(&mail, &Command::mark_as_read("43")).await,
            vec!["Message marked as read."]
        );
        assert_eq!(mail.calls(), vec!["delete_message:42", "mark_as_read:43"]);
    }

    #[tokio::test]
    async fn test_missing_credentials_recover_with_login() {
        for command in [
            Command::get_messages(2),
            Command::get_message("m1"),
            Command::delete_message("m1"),
            Command::mark_as_read("m1"),
            Command::logout(),
        ] {
            let mail = FakeMail::new().failing(MailFailure::CredentialsMissing);
            let replies = dispatcher().execute(&mail, &command).await;
            assert_eq!(
                replies,
                vec![format!("Please login to Gmail first:\n{}", FAKE_AUTH_URL)],
                "{:?}",
                command
            );
            assert_eq!(mail.calls().last().map(String::as_str), Some("login"));
        }
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_recovers_with_login() {
        let mail = FakeMail::new().failing(MailFailure::RefreshFailed);
        let replies = dispatcher().execute(&mail, &Command::get_messages(1)).await;
        assert_eq!(
            replies,
            vec![format!("Please login to Gmail first:\n{}", FAKE_AUTH_URL)]
        );
        assert_eq!(mail.calls(), vec!["get_messages:1", "login"]);
    }

    #[tokio::test]
    async fn test_other_errors_are_reported() {
        let mail = FakeMail::new().failing(MailFailure::Api("quota exceeded".to_string()));
        let replies = dispatcher().execute(&mail, &Command::delete_message("42")).await;
        assert_eq!(replies, vec!["Error: Mail API returned 500: quota exceeded"]);
        assert_eq!(mail.calls(), vec!["delete_message:42"]);
    }

    #[tokio::test]
    async fn test_look_alike_error_text_is_not_recovered() {
        let mail = FakeMail::new().failing(MailFailure::Api(
            "No stored credentials for user 7".to_string(),
        ));
        let replies = dispatcher().execute(&mail, &Command::get_messages(1)).await;
        assert!(replies[0].starts_with("Error: "));
        assert!(!mail.calls().contains(&"login".to_string()));
    }
}
