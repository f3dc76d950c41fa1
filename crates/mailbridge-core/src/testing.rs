//! In-memory collaborators for tests

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::ai::{Completion, CompletionClient};
use crate::chat::{ChatClient, MessageHandler};
use crate::error::{Error, Result};
use crate::mail::{MailClient, MailClientFactory};
use crate::models::{AuthorizationRequest, AuthorizedUser, ChatMessage, MailMessage};

pub const FAKE_AUTH_URL: &str = "https://accounts.example.com/consent?state=state-1";

/// How a [`FakeCompletion`] answers
#[derive(Debug, Clone)]
pub enum Script {
    Json(Value),
    Text(String),
    Fail(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionCall {
    pub input: String,
    pub system_prompt: Option<String>,
    pub schema: Option<Value>,
}

/// Completion client with scripted answers for structured and free-text calls
pub struct FakeCompletion {
    structured: Script,
    free_text: Script,
    calls: Mutex<Vec<CompletionCall>>,
}

impl FakeCompletion {
    pub fn new(structured: Script, free_text: Script) -> Self {
        Self {
            structured,
            free_text,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn json(value: Value) -> Self {
        Self::new(Script::Json(value.clone()), Script::Json(value))
    }

    pub fn text(text: &str) -> Self {
        Self::new(Script::Text(text.to_string()), Script::Text(text.to_string()))
    }

    pub fn failing(message: &str) -> Self {
        Self::new(Script::Fail(message.to_string()), Script::Fail(message.to_string()))
    }

    /// Names no action when parsing, replies with `reply` when chatting
    pub fn conversational(reply: &str) -> Self {
        Self::new(
            Script::Json(serde_json::json!({"action": null})),
            Script::Text(reply.to_string()),
        )
    }

    pub fn calls(&self) -> Vec<CompletionCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn generate_response(
        &self,
        input: &str,
        system_prompt: Option<&str>,
        schema: Option<&Value>,
    ) -> Result<Completion> {
        self.calls.lock().push(CompletionCall {
            input: input.to_string(),
            system_prompt: system_prompt.map(String::from),
            schema: schema.cloned(),
        });

        let script = if schema.is_some() {
            &self.structured
        } else {
            &self.free_text
        };
        match script {
            Script::Json(value) => Ok(Completion::Json(value.clone())),
            Script::Text(text) => Ok(Completion::Text(text.clone())),
            Script::Fail(message) => Err(Error::AiRequest(message.clone())),
        }
    }
}

/// Failure injected into [`FakeMail`] mailbox operations
#[derive(Debug, Clone)]
pub enum MailFailure {
    CredentialsMissing,
    RefreshFailed,
    Api(String),
}

/// Mail client recording each call as `"op"` or `"op:arg"`
pub struct FakeMail {
    messages: Vec<MailMessage>,
    failure: Option<MailFailure>,
    calls: Mutex<Vec<String>>,
}

impl FakeMail {
    pub fn new() -> Self {
        Self::with_messages(Vec::new())
    }

    pub fn with_messages(messages: Vec<MailMessage>) -> Self {
        Self {
            messages,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make every operation except `login` fail
    pub fn failing(mut self, failure: MailFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().push(call);
        match &self.failure {
            None => Ok(()),
            Some(MailFailure::CredentialsMissing) => Err(Error::CredentialsMissing {
                user_id: "user-1".to_string(),
            }),
            Some(MailFailure::RefreshFailed) => Err(Error::TokenRefreshFailed {
                user_id: "user-1".to_string(),
                reason: "invalid_grant".to_string(),
            }),
            Some(MailFailure::Api(message)) => Err(Error::MailApi {
                status: 500,
                message: message.clone(),
            }),
        }
    }
}

#[async_trait]
impl MailClient for FakeMail {
    fn provider_name(&self) -> &str {
        "Gmail"
    }

    async fn login(&self) -> Result<AuthorizationRequest> {
        self.calls.lock().push("login".to_string());
        Ok(AuthorizationRequest {
            authorization_url: FAKE_AUTH_URL.to_string(),
            state: "state-1".to_string(),
        })
    }

    async fn callback(&self, code: &str, state: Option<&str>) -> Result<AuthorizedUser> {
        self.record(format!("callback:{}", code))?;
        match state {
            Some("state-1") => Ok(AuthorizedUser {
                user_id: "user-1".to_string(),
            }),
            _ => Err(Error::InvalidOAuthState),
        }
    }

    async fn logout(&self) -> Result<bool> {
        self.record("logout".to_string())?;
        Ok(true)
    }

    async fn get_messages(&self, max_results: u32) -> Result<Vec<MailMessage>> {
        self.record(format!("get_messages:{}", max_results))?;
        Ok(self
            .messages
            .iter()
            .take(max_results as usize)
            .map(|m| MailMessage {
                body: String::new(),
                ..m.clone()
            })
            .collect())
    }

    async fn get_message(&self, message_id: &str) -> Result<MailMessage> {
        self.record(format!("get_message:{}", message_id))?;
        self.messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .ok_or_else(|| Error::MessageNotFound(message_id.to_string()))
    }

    async fn delete_message(&self, message_id: &str) -> Result<bool> {
        self.record(format!("delete_message:{}", message_id))?;
        Ok(true)
    }

    async fn mark_as_read(&self, message_id: &str) -> Result<bool> {
        self.record(format!("mark_as_read:{}", message_id))?;
        Ok(true)
    }
}

/// Factory handing out one shared [`FakeMail`]
pub struct FakeMailFactory {
    pub mail: Arc<FakeMail>,
    users: Mutex<Vec<String>>,
    fail: bool,
}

impl FakeMailFactory {
    pub fn new(mail: FakeMail) -> Self {
        Self {
            mail: Arc::new(mail),
            users: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// A factory whose `client_for` always fails
    pub fn broken() -> Self {
        Self {
            fail: true,
            ..Self::new(FakeMail::new())
        }
    }

    /// User ids clients were requested for
    pub fn users(&self) -> Vec<String> {
        self.users.lock().clone()
    }
}

impl MailClientFactory for FakeMailFactory {
    fn client_for(&self, user_id: &str) -> Result<Arc<dyn MailClient>> {
        self.users.lock().push(user_id.to_string());
        if self.fail {
            return Err(Error::Config("mail provider not configured".to_string()));
        }
        Ok(self.mail.clone())
    }
}

/// Chat client recording sent messages
#[derive(Default)]
pub struct FakeChat {
    sent: Mutex<Vec<(String, String)>>,
    /// Sends after this many succeed fail
    fail_after: Option<usize>,
}

impl FakeChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(successes: usize) -> Self {
        Self {
            fail_after: Some(successes),
            ..Self::default()
        }
    }

    /// `(channel_id, content)` pairs in send order
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<bool> {
        let mut sent = self.sent.lock();
        if self.fail_after.is_some_and(|n| sent.len() >= n) {
            return Err(Error::ChatSend("connection reset".to_string()));
        }
        sent.push((channel_id.to_string(), content.to_string()));
        Ok(true)
    }

    async fn get_message(&self, _channel_id: &str, message_id: &str) -> Result<ChatMessage> {
        Err(Error::Chat(format!("Message {} not found", message_id)))
    }

    async fn get_messages(&self, _channel_id: &str, _limit: u32) -> Result<Vec<ChatMessage>> {
        Ok(Vec::new())
    }

    async fn delete_message(&self, _channel_id: &str, _message_id: &str) -> Result<bool> {
        Ok(true)
    }

    async fn listen(
        &self,
        _handler: Arc<dyn MessageHandler>,
        cancel: CancellationToken,
    ) -> Result<()> {
        cancel.cancelled().await;
        Ok(())
    }
}

/// A direct message from `user-1` in channel `dm-1`
pub fn inbound(content: &str) -> ChatMessage {
    ChatMessage {
        id: "msg-1".to_string(),
        channel_id: "dm-1".to_string(),
        sender_id: "user-1".to_string(),
        sender_name: "Ada".to_string(),
        content: content.to_string(),
        timestamp: "2024-01-01T10:00:00+00:00".to_string(),
        edited_timestamp: None,
    }
}
