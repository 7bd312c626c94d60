//! Uploaded-file bookkeeping with content-hash deduplication.
//!
//! The registry is the authoritative corpus: the vector index is always
//! rebuilt from [`FileRegistry::sections`]. It has no index or network side
//! effects of its own.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::UploadedFile;

/// What a [`FileRegistry::submit`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitOutcome {
    /// The name was not registered; the file was stored.
    New,
    /// Same name, same content hash; nothing changed.
    Duplicate,
    /// Same name, different content; the stored file was replaced.
    Updated,
}

impl SubmitOutcome {
    /// Whether the corpus changed and the index needs rebuilding.
    pub fn changes_corpus(&self) -> bool {
        !matches!(self, SubmitOutcome::Duplicate)
    }
}

/// Lowercase hex SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Files keyed by name, kept in name order.
///
/// `hashes` and `texts` always share the same key set: every mutation
/// touches both or neither.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRegistry {
    hashes: BTreeMap<String, String>,
    texts: BTreeMap<String, String>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted files. Later duplicates of a name win.
    pub fn from_files<I>(files: I) -> Self
    where
        I: IntoIterator<Item = UploadedFile>,
    {
        let mut registry = Self::new();
        for file in files {
            registry.hashes.insert(file.name.clone(), file.content_hash);
            registry.texts.insert(file.name, file.raw_text);
        }
        registry
    }

    /// Register `content` under `name`, reporting whether it was new, a
    /// duplicate of what is already stored, or an update.
    pub fn submit(&mut self, name: &str, content: &str) -> SubmitOutcome {
        let hash = content_hash(content);

        let outcome = match self.hashes.get(name) {
            None => SubmitOutcome::New,
            Some(existing) if *existing == hash => return SubmitOutcome::Duplicate,
            Some(_) => SubmitOutcome::Updated,
        };

        self.hashes.insert(name.to_string(), hash);
        self.texts.insert(name.to_string(), content.to_string());
        outcome
    }

    pub fn clear(&mut self) {
        self.hashes.clear();
        self.texts.clear();
    }

    /// `(name, text)` pairs sorted by name.
    pub fn all_content(&self) -> Vec<(&str, &str)> {
        self.texts
            .iter()
            .map(|(name, text)| (name.as_str(), text.as_str()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<UploadedFile> {
        let content_hash = self.hashes.get(name)?;
        let raw_text = self.texts.get(name)?;
        Some(UploadedFile {
            name: name.to_string(),
            content_hash: content_hash.clone(),
            raw_text: raw_text.clone(),
        })
    }

    pub fn hash_of(&self, name: &str) -> Option<&str> {
        self.hashes.get(name).map(String::as_str)
    }

    /// Snapshot of every file, sorted by name.
    pub fn files(&self) -> Vec<UploadedFile> {
        self.hashes
            .iter()
            .zip(self.texts.values())
            .map(|((name, hash), text)| UploadedFile {
                name: name.clone(),
                content_hash: hash.clone(),
                raw_text: text.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Per-file corpus sections, each labeled with its file name.
    pub fn sections(&self) -> Vec<(&str, String)> {
        self.all_content()
            .into_iter()
            .map(|(name, text)| (name, section_text(name, text)))
            .collect()
    }

    /// The whole corpus: every labeled section, in name order.
    pub fn corpus(&self) -> String {
        self.sections()
            .into_iter()
            .map(|(_, section)| section)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn section_text(name: &str, text: &str) -> String {
    format!("File: {}\n\n{}", name, text.trim())
}
