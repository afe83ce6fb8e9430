//! Chat-completion client for reply generation.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Chat;
use rig::message::Message;
use rig::providers::openai;
use secrecy::{ExposeSecret, SecretString};

use crate::error::LlmError;

const PROVIDER: &str = "openai";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One completion call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Subject id forwarded as the provider's `user` field.
    pub user: String,
}

/// Anything that can answer a chat request with a single string.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError>;
}

/// OpenAI-compatible completion through rig-core.
///
/// Uses `/chat/completions`, not the Responses API.
pub struct RigChatCompleter {
    client: openai::CompletionsClient,
}

impl RigChatCompleter {
    pub fn new(api_key: &SecretString, base_url: &str) -> Result<Self, LlmError> {
        let client: openai::Client = openai::Client::builder()
            .api_key(api_key.expose_secret())
            .base_url(base_url)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            })?;
        Ok(Self {
            client: client.completions_api(),
        })
    }
}

/// Split messages into (preamble, prompt, prior turns).
fn split_messages(messages: &[ChatMessage]) -> Option<(String, String, Vec<&ChatMessage>)> {
    let preamble = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut turns: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != Role::System).collect();
    let last = turns.pop()?;
    if last.role != Role::User {
        return None;
    }
    Some((preamble, last.content.clone(), turns))
}

#[async_trait]
impl ChatCompleter for RigChatCompleter {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        let (preamble, prompt, turns) =
            split_messages(&request.messages).ok_or_else(|| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: "request must end with a user message".to_string(),
            })?;

        let history: Vec<Message> = turns
            .into_iter()
            .map(|m| match m.role {
                Role::Assistant => Message::assistant(m.content.clone()),
                _ => Message::user(m.content.clone()),
            })
            .collect();

        let agent = self
            .client
            .agent(&request.model)
            .preamble(&preamble)
            .additional_params(serde_json::json!({ "user": request.user }))
            .build();

        let answer = agent
            .chat(Message::user(prompt), history)
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        Ok(answer.trim().to_string())
    }
}
