//! Core data types that flow through the upload and question pipelines.

use serde::Serialize;

/// A plain-text file the user has uploaded.
///
/// Replaced as a whole when the same name is re-uploaded with different
/// content; never partially updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    /// Unique key within the registry.
    pub name: String,
    /// Lowercase hex SHA-256 of `raw_text`.
    pub content_hash: String,
    pub raw_text: String,
}

/// A bounded piece of corpus text sized for embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: String,
    /// Name of the file whose section this chunk was split from.
    pub source: String,
    /// Split order within the source section, starting at 0.
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Ai,
    Human,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Ai => "AI",
            Role::Human => "Human",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }
}

/// Ordered conversation turns for one session.
///
/// Append-only between resets. Every reset seeds the history with a single
/// AI greeting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChatHistory {
    turns: Vec<ConversationTurn>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh history holding only the given AI greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            turns: vec![ConversationTurn::ai(greeting)],
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn push_human(&mut self, content: impl Into<String>) {
        self.push(ConversationTurn::human(content));
    }

    pub fn push_ai(&mut self, content: impl Into<String>) {
        self.push(ConversationTurn::ai(content));
    }

    pub fn reset(&mut self, greeting: impl Into<String>) {
        *self = Self::with_greeting(greeting);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// True once the user has asked at least one question. Greetings alone
    /// do not make a history worth rewriting against.
    pub fn has_human_turns(&self) -> bool {
        self.turns.iter().any(|t| t.role == Role::Human)
    }
}
