//! The conversation session: one user's files, index, and chat history.
//!
//! ```text
//!            process_upload            ask
//!  NoIndex ─────────────────▶ Ready ─────────▶ Thinking
//!     ▲                         ▲                 │
//!     │ clear_files             └─────────────────┘
//!     └──────────────────────── (any state)
//! ```
//!
//! Every mutating operation takes `&mut self`, so a session processes one
//! request at a time. Failed uploads leave the registry, index, and history
//! exactly as they were.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::answer::{AnswerComposer, FALLBACK_ANSWER};
use crate::chunk::chunk_document;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::index::{SearchHit, VectorIndex};
use crate::llm::ChatModel;
use crate::models::{ChatHistory, Chunk, ConversationTurn};
use crate::registry::{FileRegistry, SubmitOutcome};
use crate::retrieve::{Retriever, DEFAULT_TOP_K};
use crate::rewrite::QueryRewriter;
use crate::store::IndexStore;

pub const UPLOAD_PROMPT: &str = "Hello! Please upload a text file to start chatting.";
pub const LOADED_GREETING: &str = "Hello! An existing database is loaded. Ask me anything about it.";
pub const PROCESSED_GREETING: &str = "Hello! The file has been processed. How can I help you?";

/// Tunables for splitting, retrieval, and embedding batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub batch_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: DEFAULT_TOP_K,
            batch_size: 64,
        }
    }
}

impl SessionOptions {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be > 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(Error::Config("top_k must be >= 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be >= 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No index exists; questions are rejected.
    NoIndex,
    Ready,
    /// A question is being answered.
    Thinking,
}

/// Result of [`ConversationSession::process_upload`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub name: String,
    pub outcome: SubmitOutcome,
    /// Chunks in the index after the upload.
    pub chunks: usize,
    /// Files in the registry after the upload.
    pub files: usize,
}

/// A grounded answer and what it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// The standalone query actually used for retrieval.
    pub search_query: String,
    pub sources: Vec<SearchHit>,
}

pub struct ConversationSession {
    options: SessionOptions,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn IndexStore>,
    rewriter: QueryRewriter,
    retriever: Retriever,
    composer: AnswerComposer,
    registry: FileRegistry,
    index: Option<VectorIndex>,
    history: ChatHistory,
    state: SessionState,
}

impl ConversationSession {
    /// Start a session, restoring any index and registry already persisted
    /// in `store`.
    pub async fn open(
        options: SessionOptions,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        store: Arc<dyn IndexStore>,
    ) -> Result<Self> {
        options.validate()?;

        let (index, registry, state, greeting) = match VectorIndex::load(store.as_ref()).await? {
            Some((index, files)) => {
                info!(
                    chunks = index.len(),
                    files = files.len(),
                    model = index.model(),
                    "existing index loaded"
                );
                (
                    Some(index),
                    FileRegistry::from_files(files),
                    SessionState::Ready,
                    LOADED_GREETING,
                )
            }
            None => (None, FileRegistry::new(), SessionState::NoIndex, UPLOAD_PROMPT),
        };

        Ok(Self {
            rewriter: QueryRewriter::new(chat.clone()),
            retriever: Retriever::new(embedder.clone(), options.top_k),
            composer: AnswerComposer::new(chat),
            options,
            embedder,
            store,
            registry,
            index,
            history: ChatHistory::with_greeting(greeting),
            state,
        })
    }

    /// Register a file and rebuild the index if the corpus changed.
    pub async fn process_upload(&mut self, name: &str, content: &str) -> Result<UploadReport> {
        if name.trim().is_empty() {
            return Err(Error::EmptyInput("file name is blank".to_string()));
        }
        if content.trim().is_empty() {
            warn!(name, "ignoring empty upload");
            return Err(Error::EmptyInput(format!("'{}' has no text", name)));
        }

        let mut registry = self.registry.clone();
        let outcome = registry.submit(name, content);

        if !outcome.changes_corpus() {
            info!(name, "duplicate upload; index unchanged");
            return Ok(UploadReport {
                name: name.to_string(),
                outcome,
                chunks: self.index.as_ref().map_or(0, VectorIndex::len),
                files: self.registry.len(),
            });
        }

        let chunks = split_registry(&registry, &self.options);
        let index = VectorIndex::rebuild(
            chunks,
            registry.files(),
            self.embedder.as_ref(),
            self.store.as_ref(),
            self.options.batch_size,
        )
        .await?;

        info!(name, ?outcome, chunks = index.len(), "file processed");
        let report = UploadReport {
            name: name.to_string(),
            outcome,
            chunks: index.len(),
            files: registry.len(),
        };

        self.registry = registry;
        self.index = Some(index);
        self.state = SessionState::Ready;
        self.history.reset(PROCESSED_GREETING);
        Ok(report)
    }

    /// Answer a question from the indexed files.
    ///
    /// The question and the answer are always appended as a pair; if any
    /// step fails the answer turn is [`FALLBACK_ANSWER`] and the error is
    /// returned.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::EmptyInput("question is blank".to_string()));
        }
        if self.index.is_none() {
            return Err(Error::NoIndex);
        }

        self.state = SessionState::Thinking;
        let prior_turns = self.history.len();
        self.history.push_human(question);

        let result = self
            .answer_question(&self.history.turns()[..prior_turns], question)
            .await;

        match &result {
            Ok(answer) => self.history.push_ai(answer.text.clone()),
            Err(e) => {
                warn!(error = %e, "question failed; recording fallback answer");
                self.history.push_ai(FALLBACK_ANSWER);
            }
        }
        self.state = SessionState::Ready;
        result
    }

    async fn answer_question(&self, prior: &[ConversationTurn], question: &str) -> Result<Answer> {
        let index = self.index.as_ref().ok_or(Error::NoIndex)?;

        let search_query = self.rewriter.rewrite(prior, question).await?;
        let sources = self.retriever.retrieve(index, &search_query).await?;
        let text = self.composer.compose(prior, question, &sources).await?;

        Ok(Answer {
            text,
            search_query,
            sources,
        })
    }

    /// Forget every file and delete the persisted index.
    pub async fn clear_files(&mut self) -> Result<()> {
        self.store.clear().await.map_err(Error::Store)?;
        self.registry.clear();
        self.index = None;
        self.state = SessionState::NoIndex;
        self.history.reset(UPLOAD_PROMPT);
        info!("all files cleared");
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }
}

/// Split every registry section into chunks tagged with its file name.
fn split_registry(registry: &FileRegistry, options: &SessionOptions) -> Vec<Chunk> {
    registry
        .sections()
        .into_iter()
        .flat_map(|(name, section)| {
            chunk_document(name, &section, options.chunk_size, options.chunk_overlap)
        })
        .collect()
}
