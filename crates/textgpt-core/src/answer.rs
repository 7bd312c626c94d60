//! Grounded answer generation from retrieved chunks.

use std::sync::Arc;

use tracing::warn;

use crate::error::{Error, Result};
use crate::index::SearchHit;
use crate::llm::{ChatMessage, ChatModel};
use crate::models::ConversationTurn;

/// Returned when the model produced no usable answer.
pub const FALLBACK_ANSWER: &str = "Sorry, I could not find an answer.";

const SYSTEM_TEMPLATE: &str = "Answer the user's questions based on the below context:\n\n";

pub struct AnswerComposer {
    chat: Arc<dyn ChatModel>,
}

impl AnswerComposer {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat }
    }

    /// Ask the model to answer `question` from the retrieved `hits`.
    pub async fn compose(
        &self,
        history: &[ConversationTurn],
        question: &str,
        hits: &[SearchHit],
    ) -> Result<String> {
        let messages = build_messages(history, question, hits);
        let completion = self
            .chat
            .complete(&messages)
            .await
            .map_err(Error::Completion)?;

        match completion.non_blank() {
            Some(answer) => Ok(answer.to_string()),
            None => {
                warn!(
                    model = self.chat.model_name(),
                    "completion had no answer; using fallback"
                );
                Ok(FALLBACK_ANSWER.to_string())
            }
        }
    }
}

fn build_messages(
    history: &[ConversationTurn],
    question: &str,
    hits: &[SearchHit],
) -> Vec<ChatMessage> {
    let context = hits
        .iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(format!("{SYSTEM_TEMPLATE}{context}")));
    messages.extend(history.iter().map(ChatMessage::from));
    messages.push(ChatMessage::human(question));
    messages
}
