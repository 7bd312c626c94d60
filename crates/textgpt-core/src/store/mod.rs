//! Durable storage abstraction for the vector index.
//!
//! An [`IndexStore`] holds at most one [`IndexSnapshot`]: the chunks, their
//! vectors, the embedding model identity, and the files the index was built
//! from. Replacement is all-or-nothing; readers never observe a mix of old
//! and new entries.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Chunk, UploadedFile};

/// One indexed chunk and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    #[serde(skip)]
    pub vector: Vec<f32>,
}

/// Everything needed to restore an index and its registry after a restart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSnapshot {
    /// Embedding model that produced every vector.
    pub model: String,
    pub dims: usize,
    /// Unix seconds.
    pub built_at: i64,
    /// Registry contents at build time, sorted by name.
    pub files: Vec<UploadedFile>,
    /// Entries in insertion order; search tie-breaking depends on it.
    pub entries: Vec<IndexEntry>,
}

/// Abstract storage backend for the index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`load`](IndexStore::load) | Read the persisted snapshot, if any |
/// | [`replace`](IndexStore::replace) | Atomically replace the snapshot |
/// | [`clear`](IndexStore::clear) | Delete the snapshot |
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// `Ok(None)` when nothing has been persisted yet.
    async fn load(&self) -> Result<Option<IndexSnapshot>>;

    /// Replace whatever is stored. On error the previous snapshot must
    /// still be intact.
    async fn replace(&self, snapshot: &IndexSnapshot) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}
