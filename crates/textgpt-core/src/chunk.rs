//! Recursive, overlapping text splitter.
//!
//! Splits corpus text into [`Chunk`]s of at most `chunk_size` characters,
//! with `overlap` characters of shared context between consecutive chunks
//! so meaning that straddles a boundary survives in at least one chunk.
//!
//! Each chunk receives a UUID, its split index within the source section,
//! and a SHA-256 hash of its text.
//!
//! # Algorithm
//!
//! 1. Pick the first separator from `["\n\n", "\n", " ", ""]` that occurs
//!    in the text (`""` means "between characters").
//! 2. Split on it, keeping each separator at the start of the piece that
//!    follows it.
//! 3. Pieces shorter than `chunk_size` are merged greedily. When the next
//!    piece would overflow, the buffer is flushed as a chunk and pieces are
//!    dropped from its front until at most `overlap` characters remain;
//!    those seed the next chunk.
//! 4. Pieces that are still too long are split again with the remaining,
//!    finer separators.
//! 5. Chunks are whitespace-trimmed and empty ones dropped.
//!
//! All lengths are counted in `char`s, never bytes, so multi-byte text is
//! never cut inside a code point.
//!
//! # Example
//!
//! ```rust
//! use textgpt_core::chunk::split_text;
//!
//! let chunks = split_text("Hello world.\n\nSecond paragraph.", 1000, 200);
//! assert_eq!(chunks, vec!["Hello world.\n\nSecond paragraph."]);
//! assert!(split_text("   ", 1000, 200).is_empty());
//! ```

use std::collections::VecDeque;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Separator hierarchy, coarsest first.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Split text into overlapping chunks of at most `chunk_size` characters.
///
/// # Guarantees
///
/// - Empty or whitespace-only input yields no chunks.
/// - Input shorter than `chunk_size` yields exactly one chunk.
/// - Every chunk is at most `chunk_size` characters.
/// - The output is a pure function of the arguments.
///
/// `overlap` is clamped below `chunk_size`; configuration validation
/// rejects such values before they get here.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    let splitter = Splitter {
        chunk_size,
        overlap: overlap.min(chunk_size - 1),
    };
    splitter.split(text, &SEPARATORS)
}

/// Split one labeled corpus section into [`Chunk`]s tagged with `source`.
///
/// Chunk indices are contiguous from 0.
pub fn chunk_document(source: &str, text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    split_text(text, chunk_size, overlap)
        .into_iter()
        .enumerate()
        .map(|(i, piece)| make_chunk(source, i as i64, piece))
        .collect()
}

struct Splitter {
    chunk_size: usize,
    overlap: usize,
}

impl Splitter {
    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);
        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in split_keep_leading(text, separator) {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting));
                fitting.clear();
            }

            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split(piece, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting));
        }

        chunks
    }

    /// Greedily pack pieces into chunks, carrying up to `overlap` chars over.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window);

                while total > self.overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        push_joined(&mut chunks, &window);
        chunks
    }
}

/// First separator present in `text`, plus the finer separators after it.
fn pick_separator<'a, 's>(text: &str, separators: &'a [&'s str]) -> (&'s str, &'a [&'s str]) {
    for (i, &sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return (sep, &[]);
        }
        if text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split on `sep`, attaching each separator to the start of the next piece.
/// An empty separator splits into single characters.
fn split_keep_leading<'t>(text: &'t str, sep: &str) -> Vec<&'t str> {
    if sep.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(sep) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Create a single [`Chunk`] with a UUID and SHA-256 content hash.
fn make_chunk(source: &str, index: i64, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        chunk_index: index,
        text,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = split_text("Paris is the capital of France.", 1000, 200);
        assert_eq!(chunks, vec!["Paris is the capital of France."]);
    }

    #[test]
    fn test_empty_text() {
        assert!(split_text("", 1000, 200).is_empty());
        assert!(split_text(" \n\n \t", 1000, 200).is_empty());
        assert!(chunk_document("notes.txt", "", 1000, 200).is_empty());
    }

    #[test]
    fn test_chunks_never_exceed_size() {
        let text = (0..200)
            .map(|i| format!("Sentence number {} talks about topic {}.", i, i % 7))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = split_text(&text, 120, 30);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 120, "chunk too long: {}", c.len());
        }
    }

    #[test]
    fn test_character_overlap_is_exact() {
        let text = "abcdefghij".repeat(10);
        let chunks = split_text(&text, 10, 3);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            let next: Vec<char> = pair[1].chars().collect();
            assert_eq!(prev.len(), 10);
            assert_eq!(&prev[prev.len() - 3..], &next[..3]);
        }
    }

    #[test]
    fn test_word_overlap_shares_context() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let chunks = split_text(text, 20, 8);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(
                pair[1].starts_with(last_word),
                "'{}' should start with '{}'",
                pair[1],
                last_word
            );
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let para_a = "a".repeat(40);
        let para_b = "b".repeat(40);
        let text = format!("{}\n\n{}", para_a, para_b);
        let chunks = split_text(&text, 50, 0);
        assert_eq!(chunks, vec![para_a, para_b]);
    }

    #[test]
    fn test_oversized_paragraph_falls_back_to_words() {
        let long_para = "word ".repeat(50);
        let text = format!("Short intro.\n\n{}", long_para.trim());
        let chunks = split_text(&text, 40, 0);
        assert_eq!(chunks[0], "Short intro.");
        for c in &chunks[1..] {
            assert!(c.chars().count() <= 40);
            assert!(c.starts_with("word"));
        }
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let chunks = split_text(text, 8, 2);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.chars().count() <= 8);
        }
    }

    #[test]
    fn test_overlap_clamped_below_size() {
        let chunks = split_text(&"xy".repeat(20), 5, 50);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 5);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta.\n\nGamma delta epsilon.\nZeta eta theta iota kappa.";
        assert_eq!(split_text(text, 12, 4), split_text(text, 12, 4));

        let c1 = chunk_document("a.txt", text, 12, 4);
        let c2 = chunk_document("a.txt", text, 12, 4);
        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.hash, b.hash);
            assert_eq!(a.chunk_index, b.chunk_index);
        }
    }

    #[test]
    fn test_chunk_document_tags_source() {
        let chunks = chunk_document("notes.txt", "one\n\ntwo\n\nthree", 6, 0);
        assert_eq!(chunks.len(), 3);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.source, "notes.txt");
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.hash.len(), 64);
        }
    }
}
