//! Test doubles for the collaborator traits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::{normalize, Embedder};
use crate::llm::{ChatMessage, ChatModel, Completion};
use crate::store::{IndexSnapshot, IndexStore};

/// Deterministic bag-of-words embedder that counts how often it is called.
pub struct CountingEmbedder {
    model: String,
    dims: usize,
    calls: AtomicUsize,
    texts: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self::with_model("counting", dims)
    }

    pub fn with_model(model: &str, dims: usize) -> Self {
        Self {
            model: model.to_string(),
            dims,
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
        }
    }

    /// Number of `embed` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of texts embedded so far, across all calls.
    pub fn texts_embedded(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let bucket = fnv1a(word.as_bytes()) as usize % self.dims;
            v[bucket] += 1.0;
        }
        normalize(&mut v);
        v
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

/// Embedder that succeeds for `ok_calls` calls and then fails.
pub struct FailingEmbedder {
    inner: CountingEmbedder,
    ok_calls: usize,
}

impl FailingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self::after(0, dims)
    }

    pub fn after(ok_calls: usize, dims: usize) -> Self {
        Self {
            inner: CountingEmbedder::new(dims),
            ok_calls,
        }
    }
}

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.inner.calls() >= self.ok_calls {
            bail!("embedding service unavailable (HTTP 503)");
        }
        self.inner.embed(texts).await
    }
}

/// Chat model that replays scripted completions in order and records
/// every request. An exhausted script yields empty completions.
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Result<Completion>>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_replies(
            answers
                .into_iter()
                .map(|a| Ok(Completion::text(a)))
                .collect(),
        )
    }

    pub fn from_replies(replies: Vec<Result<Completion>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Completion::empty()))
    }
}

/// Store whose writes always fail; reads return whatever it was seeded with.
pub struct ReadOnlyStore {
    snapshot: Option<IndexSnapshot>,
}

impl ReadOnlyStore {
    pub fn new(snapshot: Option<IndexSnapshot>) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl IndexStore for ReadOnlyStore {
    async fn load(&self) -> Result<Option<IndexSnapshot>> {
        Ok(self.snapshot.clone())
    }

    async fn replace(&self, _snapshot: &IndexSnapshot) -> Result<()> {
        Err(anyhow!("disk full"))
    }

    async fn clear(&self) -> Result<()> {
        Err(anyhow!("read-only store"))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
