//! Turns a follow-up question into a standalone search query.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::llm::{ChatMessage, ChatModel};
use crate::models::{ConversationTurn, Role};

/// Appended after the conversation when asking for a search query.
pub const REWRITE_INSTRUCTION: &str = "Given the above conversation, generate a search query to look up in order to get information relevant to the conversation";

pub struct QueryRewriter {
    chat: Arc<dyn ChatModel>,
}

impl QueryRewriter {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// Rewrite `question` against the prior turns.
    ///
    /// Without any earlier human turn there is nothing to resolve, so the
    /// question is returned unchanged and the model is not called.
    pub async fn rewrite(&self, history: &[ConversationTurn], question: &str) -> Result<String> {
        if !history.iter().any(|t| t.role == Role::Human) {
            return Ok(question.to_string());
        }

        let mut messages: Vec<ChatMessage> = history.iter().map(ChatMessage::from).collect();
        messages.push(ChatMessage::human(question));
        messages.push(ChatMessage::human(REWRITE_INSTRUCTION));

        let completion = self
            .chat
            .complete(&messages)
            .await
            .map_err(Error::Completion)?;

        match completion.non_blank() {
            Some(query) => {
                debug!(question, query, "rewrote question into search query");
                Ok(query.to_string())
            }
            None => {
                warn!(
                    model = self.chat.model_name(),
                    "query rewrite returned no text; searching with the raw question"
                );
                Ok(question.to_string())
            }
        }
    }
}
