//! Command implementations: wiring config to a session and printing results.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;

use textgpt_core::index::VectorIndex;
use textgpt_core::registry::SubmitOutcome;
use textgpt_core::session::{Answer, UploadReport};
use textgpt_core::ConversationSession;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::llm::create_chat_model;
use crate::sqlite_store::SqliteIndexStore;

/// Open a session over the configured index with the configured providers.
pub async fn open_session(config: &Config) -> Result<ConversationSession> {
    let embedder = create_embedder(config)?;
    let chat = create_chat_model(config)?;
    let store = Arc::new(SqliteIndexStore::new(&config.index.path));

    let session =
        ConversationSession::open(config.session_options(), embedder, chat, store).await?;
    Ok(session)
}

/// Read an upload from disk. The display name is the file name.
pub fn read_upload(path: &Path) -> Result<(String, String)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let content = String::from_utf8(bytes)
        .with_context(|| format!("{} is not valid UTF-8 text", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok((name, content))
}

/// Upload one file into `session` and describe what happened.
pub async fn upload_file(session: &mut ConversationSession, path: &Path) -> Result<UploadReport> {
    let (name, content) = read_upload(path)?;
    let report = session.process_upload(&name, &content).await?;
    Ok(report)
}

pub fn describe_upload(report: &UploadReport) -> String {
    match report.outcome {
        SubmitOutcome::Duplicate => format!(
            "{}: already processed, index unchanged ({} chunks)",
            report.name, report.chunks
        ),
        SubmitOutcome::New | SubmitOutcome::Updated => format!(
            "{}: {} ({} chunks indexed from {} file{})",
            report.name,
            if report.outcome == SubmitOutcome::New {
                "added"
            } else {
                "updated"
            },
            report.chunks,
            report.files,
            if report.files == 1 { "" } else { "s" }
        ),
    }
}

pub fn print_answer(answer: &Answer, show_sources: bool) {
    println!("{}", answer.text);
    if show_sources {
        println!();
        println!("Search query: {}", answer.search_query);
        for (i, hit) in answer.sources.iter().enumerate() {
            println!(
                "  [{}] {}#{} (score {:.3})",
                i + 1,
                hit.chunk.source,
                hit.chunk.chunk_index,
                hit.score
            );
        }
    }
}

// ============ Commands ============

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub index_path: PathBuf,
    pub indexed: bool,
    pub model: Option<String>,
    pub dims: Option<usize>,
    pub chunks: usize,
    pub built_at: Option<String>,
    pub files: Vec<FileStatus>,
}

#[derive(Debug, Serialize)]
pub struct FileStatus {
    pub name: String,
    pub content_hash: String,
    pub bytes: usize,
}

/// Describe the persisted index without creating any provider.
pub async fn status(config: &Config) -> Result<StatusReport> {
    let store = SqliteIndexStore::new(&config.index.path);
    let loaded = VectorIndex::load(&store).await?;
    store.close().await;

    let report = match loaded {
        Some((index, files)) => StatusReport {
            index_path: store.db_path().to_path_buf(),
            indexed: true,
            model: Some(index.model().to_string()),
            dims: Some(index.dims()),
            chunks: index.len(),
            built_at: chrono::DateTime::from_timestamp(index.built_at(), 0)
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            files: files
                .into_iter()
                .map(|f| FileStatus {
                    bytes: f.raw_text.len(),
                    name: f.name,
                    content_hash: f.content_hash,
                })
                .collect(),
        },
        None => StatusReport {
            index_path: store.db_path().to_path_buf(),
            indexed: false,
            model: None,
            dims: None,
            chunks: 0,
            built_at: None,
            files: Vec::new(),
        },
    };
    Ok(report)
}

pub async fn run_status(config: &Config, json: bool) -> Result<()> {
    let report = status(config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("TextGPT — Index Status");
    println!("======================");
    println!();
    println!("  Index:     {}", report.index_path.display());
    if !report.indexed {
        println!("  No index yet. Upload a text file to start chatting.");
        return Ok(());
    }
    println!("  Model:     {} ({} dims)", report.model.as_deref().unwrap_or("?"), report.dims.unwrap_or(0));
    println!("  Chunks:    {}", report.chunks);
    println!("  Built:     {}", report.built_at.as_deref().unwrap_or("unknown"));
    println!("  Files:     {}", report.files.len());
    for file in &report.files {
        println!("    {:<32} {:>8} bytes  {}", file.name, file.bytes, &file.content_hash[..12.min(file.content_hash.len())]);
    }
    Ok(())
}

pub async fn run_upload(config: &Config, paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        bail!("no files given");
    }
    let mut session = open_session(config).await?;
    for path in paths {
        let report = upload_file(&mut session, path).await?;
        info!(file = %report.name, outcome = ?report.outcome, "upload finished");
        println!("{}", describe_upload(&report));
    }
    Ok(())
}

pub async fn run_ask(config: &Config, question: &str, json: bool, show_sources: bool) -> Result<()> {
    let mut session = open_session(config).await?;
    let answer = session.ask(question).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer, show_sources);
    }
    Ok(())
}

pub async fn run_clear(config: &Config) -> Result<()> {
    let mut session = open_session(config).await?;
    let files = session.registry().len();
    session.clear_files().await?;
    println!("Cleared {} file{} and the vector index.", files, if files == 1 { "" } else { "s" });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn offline_config(root: &Path) -> Config {
        let mut config = crate::config::parse_config(
            "[embedding]\nprovider = \"hash\"\n[llm]\nprovider = \"ollama\"\nmodel = \"llama3.2\"\n",
        )
        .unwrap();
        config.index.path = root.join("index");
        config
    }

    #[test]
    fn test_read_upload_rejects_binary() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blob.bin");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let err = read_upload(&path).unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    #[test]
    fn test_describe_upload() {
        let report = UploadReport {
            name: "notes.txt".into(),
            outcome: SubmitOutcome::New,
            chunks: 3,
            files: 1,
        };
        assert_eq!(describe_upload(&report), "notes.txt: added (3 chunks indexed from 1 file)");

        let dup = UploadReport {
            outcome: SubmitOutcome::Duplicate,
            ..report
        };
        assert!(describe_upload(&dup).contains("already processed"));
    }

    #[tokio::test]
    async fn test_status_before_and_after_upload() {
        let tmp = TempDir::new().unwrap();
        let config = offline_config(tmp.path());

        let report = status(&config).await.unwrap();
        assert!(!report.indexed);
        assert!(!report.index_path.exists());

        let file = tmp.path().join("notes.txt");
        std::fs::write(&file, "Paris is the capital of France.").unwrap();
        let mut session = open_session(&config).await.unwrap();
        upload_file(&mut session, &file).await.unwrap();

        let report = status(&config).await.unwrap();
        assert!(report.indexed);
        assert_eq!(report.model.as_deref(), Some("hash-bow-256"));
        assert_eq!(report.chunks, 1);
        assert_eq!(report.files[0].name, "notes.txt");
    }
}
