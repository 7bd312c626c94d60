//! The vector index: embedded chunks with brute-force cosine search.
//!
//! The index is rebuilt wholesale from the registry corpus whenever the
//! corpus changes. [`VectorIndex::rebuild`] embeds every chunk, then hands
//! the complete snapshot to the [`IndexStore`] in one atomic replace, so a
//! failed rebuild leaves the previously persisted index in place.

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::{debug, info};

use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{Error, Result};
use crate::models::{Chunk, UploadedFile};
use crate::store::{IndexEntry, IndexSnapshot, IndexStore};

/// A chunk returned from [`VectorIndex::search`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    model: String,
    dims: usize,
    built_at: i64,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Embed `chunks` in batches of `batch_size` and persist them, with
    /// `files`, as the new index.
    pub async fn rebuild(
        chunks: Vec<Chunk>,
        files: Vec<UploadedFile>,
        embedder: &dyn Embedder,
        store: &dyn IndexStore,
        batch_size: usize,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::EmptyInput(
                "corpus produced no chunks to index".to_string(),
            ));
        }

        let vectors = embed_chunks(&chunks, embedder, batch_size.max(1))
            .await
            .map_err(Error::Build)?;

        let snapshot = IndexSnapshot {
            model: embedder.model_name().to_string(),
            dims: embedder.dims(),
            built_at: chrono::Utc::now().timestamp(),
            files,
            entries: chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexEntry { chunk, vector })
                .collect(),
        };

        store
            .replace(&snapshot)
            .await
            .context("failed to persist vector index")
            .map_err(Error::Build)?;

        info!(
            model = %snapshot.model,
            dims = snapshot.dims,
            chunks = snapshot.entries.len(),
            files = snapshot.files.len(),
            "vector index rebuilt"
        );

        Ok(Self::from_snapshot(snapshot).0)
    }

    /// Restore the persisted index and the files it was built from.
    pub async fn load(store: &dyn IndexStore) -> Result<Option<(Self, Vec<UploadedFile>)>> {
        let Some(snapshot) = store.load().await.map_err(Error::Store)? else {
            return Ok(None);
        };

        if let Some(bad) = snapshot
            .entries
            .iter()
            .find(|e| e.vector.len() != snapshot.dims)
        {
            return Err(Error::Store(anyhow::anyhow!(
                "persisted index is inconsistent: chunk {} has {} dims, index declares {}",
                bad.chunk.id,
                bad.vector.len(),
                snapshot.dims
            )));
        }

        debug!(
            model = %snapshot.model,
            chunks = snapshot.entries.len(),
            "loaded persisted vector index"
        );
        Ok(Some(Self::from_snapshot(snapshot)))
    }

    fn from_snapshot(snapshot: IndexSnapshot) -> (Self, Vec<UploadedFile>) {
        let index = Self {
            model: snapshot.model,
            dims: snapshot.dims,
            built_at: snapshot.built_at,
            entries: snapshot.entries,
        };
        (index, snapshot.files)
    }

    /// The `k` entries most similar to `query`, best first. Equal scores
    /// keep insertion order; a NaN score ranks below every number.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .map(|e| {
                let score = cosine_similarity(query, &e.vector);
                SearchHit {
                    chunk: e.chunk.clone(),
                    score: if score.is_nan() { f32::NEG_INFINITY } else { score },
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        hits
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn built_at(&self) -> i64 {
        self.built_at
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

async fn embed_chunks(
    chunks: &[Chunk],
    embedder: &dyn Embedder,
    batch_size: usize,
) -> anyhow::Result<Vec<Vec<f32>>> {
    let dims = embedder.dims();
    let mut vectors = Vec::with_capacity(chunks.len());

    for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let batch_vectors = embedder
            .embed(&texts)
            .await
            .with_context(|| format!("embedding batch {} failed", batch_no + 1))?;

        if batch_vectors.len() != texts.len() {
            bail!(
                "embedder returned {} vectors for {} chunks",
                batch_vectors.len(),
                texts.len()
            );
        }
        if let Some(v) = batch_vectors.iter().find(|v| v.len() != dims) {
            bail!("embedder returned {} dims, expected {}", v.len(), dims);
        }
        vectors.extend(batch_vectors);
    }

    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_document;
    use crate::embedding::embed_query;
    use crate::store::memory::InMemoryStore;
    use crate::testing::{CountingEmbedder, FailingEmbedder, ReadOnlyStore};

    fn corpus_chunks() -> Vec<Chunk> {
        let mut chunks = chunk_document("france.txt", "Paris is the capital of France.", 1000, 200);
        chunks.extend(chunk_document("italy.txt", "Rome is the capital of Italy.", 1000, 200));
        chunks.extend(chunk_document("food.txt", "Pasta and bread are staple foods.", 1000, 200));
        chunks
    }

    #[tokio::test]
    async fn test_rebuild_embeds_in_batches() {
        let embedder = CountingEmbedder::new(64);
        let store = InMemoryStore::new();
        let index = VectorIndex::rebuild(corpus_chunks(), vec![], &embedder, &store, 2)
            .await
            .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.model(), "counting");
        assert_eq!(embedder.calls(), 2);
        assert_eq!(embedder.texts_embedded(), 3);
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_search_ranks_relevant_chunk_first() {
        let embedder = CountingEmbedder::new(256);
        let store = InMemoryStore::new();
        let index = VectorIndex::rebuild(corpus_chunks(), vec![], &embedder, &store, 64)
            .await
            .unwrap();

        let q = embed_query(&embedder, "capital of France Paris").await.unwrap();
        let hits = index.search(&q, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.source, "france.txt");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let embedder = CountingEmbedder::new(16);
        let store = InMemoryStore::new();
        let mut chunks = chunk_document("a.txt", "same words", 1000, 0);
        chunks.extend(chunk_document("b.txt", "same words", 1000, 0));
        chunks.extend(chunk_document("c.txt", "same words", 1000, 0));
        let index = VectorIndex::rebuild(chunks, vec![], &embedder, &store, 64)
            .await
            .unwrap();

        let q = embed_query(&embedder, "same words").await.unwrap();
        let sources: Vec<String> = index.search(&q, 3).into_iter().map(|h| h.chunk.source).collect();
        assert_eq!(sources, vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[tokio::test]
    async fn test_nan_score_ranks_last() {
        let mut chunks = chunk_document("nan.txt", "broken", 1000, 0);
        chunks.extend(chunk_document("hit.txt", "match", 1000, 0));
        chunks.extend(chunk_document("miss.txt", "other", 1000, 0));
        let vectors = [vec![f32::NAN, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let snapshot = IndexSnapshot {
            model: "m".into(),
            dims: 2,
            built_at: 0,
            files: vec![],
            entries: chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexEntry { chunk, vector })
                .collect(),
        };
        let store = InMemoryStore::with_snapshot(snapshot);
        let (index, _) = VectorIndex::load(&store).await.unwrap().unwrap();

        let hits = index.search(&[1.0, 0.0], 3);
        let sources: Vec<&str> = hits.iter().map(|h| h.chunk.source.as_str()).collect();
        assert_eq!(sources, vec!["hit.txt", "miss.txt", "nan.txt"]);
        assert_eq!(hits[2].score, f32::NEG_INFINITY);
    }

    #[tokio::test]
    async fn test_k_larger_than_index() {
        let embedder = CountingEmbedder::new(16);
        let store = InMemoryStore::new();
        let index = VectorIndex::rebuild(corpus_chunks(), vec![], &embedder, &store, 64)
            .await
            .unwrap();
        let q = embed_query(&embedder, "bread").await.unwrap();
        assert_eq!(index.search(&q, 10).len(), 3);
        assert!(index.search(&q, 0).is_empty());
    }

    #[tokio::test]
    async fn test_empty_chunks_rejected() {
        let embedder = CountingEmbedder::new(16);
        let store = InMemoryStore::new();
        let err = VectorIndex::rebuild(vec![], vec![], &embedder, &store, 64)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyInput(_)));
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_preserves_persisted_index() {
        let good = CountingEmbedder::new(16);
        let store = InMemoryStore::new();
        VectorIndex::rebuild(corpus_chunks(), vec![], &good, &store, 64)
            .await
            .unwrap();
        let before = store.load().await.unwrap();

        // Second batch fails after the first succeeded.
        let flaky = FailingEmbedder::after(1, 16);
        let err = VectorIndex::rebuild(corpus_chunks(), vec![], &flaky, &store, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Build(_)));
        assert!(err.to_string().contains("batch 2"));
        assert_eq!(store.load().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_store_failure_is_build_error() {
        let embedder = CountingEmbedder::new(16);
        let store = ReadOnlyStore::new(None);
        let err = VectorIndex::rebuild(corpus_chunks(), vec![], &embedder, &store, 64)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Build(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn test_load_restores_same_ranking() {
        let embedder = CountingEmbedder::new(128);
        let store = InMemoryStore::new();
        let files = vec![UploadedFile {
            name: "france.txt".into(),
            content_hash: "h".into(),
            raw_text: "Paris is the capital of France.".into(),
        }];
        let built = VectorIndex::rebuild(corpus_chunks(), files.clone(), &embedder, &store, 64)
            .await
            .unwrap();

        let (loaded, loaded_files) = VectorIndex::load(&store).await.unwrap().unwrap();
        assert_eq!(loaded_files, files);
        assert_eq!(loaded, built);

        let q = embed_query(&embedder, "Italy capital").await.unwrap();
        assert_eq!(built.search(&q, 3), loaded.search(&q, 3));
    }

    #[tokio::test]
    async fn test_load_empty_store() {
        let store = InMemoryStore::new();
        assert!(VectorIndex::load(&store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_rejects_inconsistent_dims() {
        let mut chunks = chunk_document("a.txt", "alpha", 1000, 0);
        let snapshot = IndexSnapshot {
            model: "m".into(),
            dims: 4,
            built_at: 0,
            files: vec![],
            entries: vec![IndexEntry {
                chunk: chunks.remove(0),
                vector: vec![1.0, 0.0],
            }],
        };
        let store = InMemoryStore::with_snapshot(snapshot);
        let err = VectorIndex::load(&store).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }
}
