//! Chat-completion backend trait and message types.
//!
//! Concrete backends (OpenAI-compatible, Ollama) live in the `textgpt`
//! app crate.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{ConversationTurn, Role};

/// Role of a message sent to a chat model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    Human,
    Ai,
}

impl MessageRole {
    /// The role name used by OpenAI-style chat APIs.
    pub fn as_api_role(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::Human => "user",
            MessageRole::Ai => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Ai,
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        let role = match turn.role {
            Role::Ai => MessageRole::Ai,
            Role::Human => MessageRole::Human,
        };
        Self {
            role,
            content: turn.content.clone(),
        }
    }
}

/// The model's reply. `answer` is `None` when the response carried no
/// usable text (no choices, null content).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub answer: Option<String>,
}

impl Completion {
    pub fn text(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
        }
    }

    pub fn empty() -> Self {
        Self { answer: None }
    }

    /// The answer, if present and not blank, trimmed.
    pub fn non_blank(&self) -> Option<&str> {
        self.answer
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A chat-completion backend.
///
/// Transport and auth failures are `Err`; a well-formed response with no
/// usable answer is `Ok(Completion { answer: None })`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion>;
}
