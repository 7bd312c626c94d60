//! # TextGPT
//!
//! Chat with your text files. Upload plain-text documents, and TextGPT
//! splits them into overlapping chunks, embeds them into a persistent
//! vector index, and answers questions from the most relevant chunks with
//! a chat model, resolving follow-up questions against the conversation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────────────┐   ┌──────────┐
//! │  Upload  │──▶│  Registry → Split   │──▶│  SQLite  │
//! │  (CLI)   │   │  → Embed (batches)  │   │  index   │
//! └──────────┘   └─────────────────────┘   └────┬─────┘
//!                                               │
//! ┌──────────┐   ┌─────────────────────┐        │
//! │ Question │──▶│ Rewrite → Retrieve  │◀───────┘
//! │  (chat)  │   │ → Compose answer    │
//! └──────────┘   └─────────────────────┘
//! ```
//!
//! The pipeline itself lives in `textgpt-core`; this crate supplies the
//! HTTP providers, SQLite storage, configuration, and CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! textgpt upload notes.txt
//! textgpt ask "What is the capital of France?"
//! textgpt chat
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`embedding`] | OpenAI, Ollama, hash, and local embedders |
//! | [`llm`] | OpenAI-compatible and Ollama chat models |
//! | [`http`] | JSON POST with retry and backoff |
//! | [`sqlite_store`] | SQLite-backed index storage |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`app`] | CLI command implementations |
//! | [`chat`] | Interactive chat loop |

pub mod app;
pub mod chat;
pub mod config;
pub mod db;
pub mod embedding;
pub mod http;
pub mod llm;
pub mod migrate;
pub mod sqlite_store;
