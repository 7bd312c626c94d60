//! # TextGPT Core
//!
//! Shared pipeline logic for TextGPT: the file registry, text splitter,
//! vector index, query rewriter, retriever, answer composer, and the
//! conversation session that ties them together.
//!
//! This crate contains no tokio runtime, sqlx, HTTP, or filesystem I/O.
//! Embedding backends, chat-completion backends, and durable storage are
//! injected through the [`embedding::Embedder`], [`llm::ChatModel`], and
//! [`store::IndexStore`] traits.
//!
//! ```text
//! upload ─▶ FileRegistry ─▶ split ─▶ VectorIndex::rebuild ─▶ IndexStore
//!
//! question ─▶ QueryRewriter ─▶ Retriever ─▶ VectorIndex::search
//!                                                │
//!                         answer ◀─ AnswerComposer
//! ```

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod llm;
pub mod models;
pub mod registry;
pub mod retrieve;
pub mod rewrite;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use session::{ConversationSession, SessionOptions, SessionState};
