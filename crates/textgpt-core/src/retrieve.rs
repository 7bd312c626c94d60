//! Query embedding plus top-k lookup against the vector index.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::embedding::{embed_query, Embedder};
use crate::error::{Error, Result};
use crate::index::{SearchHit, VectorIndex};

/// Number of chunks retrieved per question unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 4;

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self { embedder, top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// The `top_k` chunks most similar to `query`.
    ///
    /// Fails with [`Error::ModelMismatch`] rather than comparing vectors from
    /// different embedding spaces.
    pub async fn retrieve(&self, index: &VectorIndex, query: &str) -> Result<Vec<SearchHit>> {
        self.check_model(index, self.embedder.dims())?;

        let qvec = embed_query(self.embedder.as_ref(), query)
            .await
            .map_err(Error::Embedding)?;
        self.check_model(index, qvec.len())?;

        let hits = index.search(&qvec, self.top_k);
        debug!(
            query,
            hits = hits.len(),
            best = hits.first().map(|h| h.score),
            "retrieved chunks"
        );
        Ok(hits)
    }

    fn check_model(&self, index: &VectorIndex, query_dims: usize) -> Result<()> {
        if index.model() == self.embedder.model_name() && index.dims() == query_dims {
            return Ok(());
        }
        warn!(
            index_model = index.model(),
            query_model = self.embedder.model_name(),
            "embedding model mismatch"
        );
        Err(Error::ModelMismatch {
            index_model: index.model().to_string(),
            index_dims: index.dims(),
            query_model: self.embedder.model_name().to_string(),
            query_dims,
        })
    }
}
