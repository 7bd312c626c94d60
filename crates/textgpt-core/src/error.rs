//! Typed error taxonomy for the question-answering pipeline.
//!
//! Collaborators (embedders, chat models, stores) report failures as
//! [`anyhow::Error`]; the core wraps them into the variant that tells the
//! caller what was affected. A malformed or missing model answer is not an
//! error at all: it degrades to [`crate::answer::FALLBACK_ANSWER`].

use thiserror::Error;

/// Result alias using the core [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Empty upload, blank question, or a corpus that splits into nothing.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// Embedding or index-write failure during a rebuild. The previously
    /// persisted index is left as it was.
    #[error("failed to build vector index: {0:#}")]
    Build(#[source] anyhow::Error),

    /// A question was asked before any index exists.
    #[error("no vector index available; upload and process a file first")]
    NoIndex,

    /// The index and the query embedder disagree on the embedding space.
    #[error(
        "embedding model mismatch: index was built with '{index_model}' ({index_dims} dims) \
         but queries use '{query_model}' ({query_dims} dims); re-upload to rebuild the index"
    )]
    ModelMismatch {
        index_model: String,
        index_dims: usize,
        query_model: String,
        query_dims: usize,
    },

    /// Embedding the search query failed.
    #[error("embedding request failed: {0:#}")]
    Embedding(#[source] anyhow::Error),

    /// The chat-completion service could not be reached or rejected the call.
    #[error("chat completion failed: {0:#}")]
    Completion(#[source] anyhow::Error),

    /// Loading or clearing durable index storage failed.
    #[error("index storage error: {0:#}")]
    Store(#[source] anyhow::Error),

    /// Invalid options or a missing credential. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the user can fix this by changing what they typed or uploaded.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Error::EmptyInput(_) | Error::NoIndex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors() {
        assert!(Error::NoIndex.is_user_error());
        assert!(Error::EmptyInput("file".into()).is_user_error());
        assert!(!Error::Config("x".into()).is_user_error());
        assert!(!Error::Build(anyhow::anyhow!("boom")).is_user_error());
    }

    #[test]
    fn test_build_error_keeps_cause_chain() {
        let cause = anyhow::anyhow!("HTTP 500").context("embedding batch 2 failed");
        let err = Error::Build(cause);
        let msg = err.to_string();
        assert!(msg.contains("embedding batch 2 failed"));
        assert!(msg.contains("HTTP 500"));
    }
}
