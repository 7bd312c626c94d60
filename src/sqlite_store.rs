//! SQLite-backed [`IndexStore`].
//!
//! The whole index lives in `<index.path>/index.sqlite`: one `index_meta`
//! row, the registry `files`, and the `chunks` with their embedding BLOBs.
//! [`replace`](IndexStore::replace) rewrites all three tables inside one
//! transaction, so readers see the old index or the new one, never a mix.
//!
//! Reads never create the database: a missing file means "no index".

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tokio::sync::OnceCell;
use tracing::debug;

use textgpt_core::embedding::{blob_to_vec, vec_to_blob};
use textgpt_core::models::{Chunk, UploadedFile};
use textgpt_core::store::{IndexEntry, IndexSnapshot, IndexStore};

use crate::{db, migrate};

pub const INDEX_DB_FILE: &str = "index.sqlite";

pub struct SqliteIndexStore {
    db_path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl SqliteIndexStore {
    /// A store rooted at the `index_dir` directory. Nothing is opened yet.
    pub fn new(index_dir: &Path) -> Self {
        Self {
            db_path: index_dir.join(INDEX_DB_FILE),
            pool: OnceCell::new(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async {
                let pool = db::connect(&self.db_path).await?;
                migrate::run_migrations(&pool).await?;
                Ok::<_, anyhow::Error>(pool)
            })
            .await
    }

    /// Whether there is nothing on disk to read.
    fn is_absent(&self) -> bool {
        self.pool.get().is_none() && !self.db_path.exists()
    }

    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

#[async_trait]
impl IndexStore for SqliteIndexStore {
    async fn load(&self) -> Result<Option<IndexSnapshot>> {
        if self.is_absent() {
            return Ok(None);
        }
        let pool = self.pool().await?;
        // One read transaction pins a single WAL snapshot for all three tables.
        let mut tx = pool.begin().await?;

        let Some(meta) = sqlx::query("SELECT model, dims, built_at FROM index_meta WHERE id = 1")
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let files = sqlx::query("SELECT name, content_hash, raw_text FROM files ORDER BY name")
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(|row| -> Result<UploadedFile> {
                Ok(UploadedFile {
                    name: row.try_get("name")?,
                    content_hash: row.try_get("content_hash")?,
                    raw_text: row.try_get("raw_text")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let entries = sqlx::query(
            "SELECT id, source, chunk_index, text, hash, embedding FROM chunks ORDER BY position",
        )
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| -> Result<IndexEntry> {
            let blob: Vec<u8> = row.try_get("embedding")?;
            Ok(IndexEntry {
                chunk: Chunk {
                    id: row.try_get("id")?,
                    source: row.try_get("source")?,
                    chunk_index: row.try_get("chunk_index")?,
                    text: row.try_get("text")?,
                    hash: row.try_get("hash")?,
                },
                vector: blob_to_vec(&blob),
            })
        })
        .collect::<Result<Vec<_>>>()?;

        tx.commit().await?;

        let dims: i64 = meta.try_get("dims")?;
        let snapshot = IndexSnapshot {
            model: meta.try_get("model")?,
            dims: usize::try_from(dims).context("negative dims in index_meta")?,
            built_at: meta.try_get("built_at")?,
            files,
            entries,
        };
        debug!(
            path = %self.db_path.display(),
            chunks = snapshot.entries.len(),
            "loaded index from sqlite"
        );
        Ok(Some(snapshot))
    }

    async fn replace(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM files").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_meta").execute(&mut *tx).await?;

        sqlx::query("INSERT INTO index_meta (id, model, dims, built_at) VALUES (1, ?, ?, ?)")
            .bind(&snapshot.model)
            .bind(snapshot.dims as i64)
            .bind(snapshot.built_at)
            .execute(&mut *tx)
            .await?;

        for file in &snapshot.files {
            sqlx::query("INSERT INTO files (name, content_hash, raw_text) VALUES (?, ?, ?)")
                .bind(&file.name)
                .bind(&file.content_hash)
                .bind(&file.raw_text)
                .execute(&mut *tx)
                .await?;
        }

        for (position, entry) in snapshot.entries.iter().enumerate() {
            sqlx::query(
                "INSERT INTO chunks (position, id, source, chunk_index, text, hash, embedding) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(position as i64)
            .bind(&entry.chunk.id)
            .bind(&entry.chunk.source)
            .bind(entry.chunk.chunk_index)
            .bind(&entry.chunk.text)
            .bind(&entry.chunk.hash)
            .bind(vec_to_blob(&entry.vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.context("Failed to commit index replace")?;
        debug!(
            path = %self.db_path.display(),
            chunks = snapshot.entries.len(),
            "index written to sqlite"
        );
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if self.is_absent() {
            return Ok(());
        }
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM files").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_meta").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn snapshot(model: &str, texts: &[&str]) -> IndexSnapshot {
        IndexSnapshot {
            model: model.to_string(),
            dims: 3,
            built_at: 1_700_000_000,
            files: vec![UploadedFile {
                name: "notes.txt".to_string(),
                content_hash: "abc".to_string(),
                raw_text: texts.join("\n\n"),
            }],
            entries: texts
                .iter()
                .enumerate()
                .map(|(i, t)| IndexEntry {
                    chunk: Chunk {
                        id: format!("chunk-{}", i),
                        source: "notes.txt".to_string(),
                        chunk_index: i as i64,
                        text: t.to_string(),
                        hash: format!("h{}", i),
                    },
                    vector: vec![i as f32, 1.0, -0.5],
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_load_missing_database_does_not_create_it() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(&tmp.path().join("index"));
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
        assert!(!store.db_path().exists());
    }

    #[tokio::test]
    async fn test_replace_and_reload_in_new_handle() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("index");
        let original = snapshot("m1", &["zeta", "alpha", "mid"]);

        let store = SqliteIndexStore::new(&dir);
        store.replace(&original).await.unwrap();
        store.close().await;

        let reopened = SqliteIndexStore::new(&dir);
        let loaded = reopened.load().await.unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[tokio::test]
    async fn test_replace_overwrites_everything() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(tmp.path());
        store.replace(&snapshot("m1", &["a", "b", "c"])).await.unwrap();
        store.replace(&snapshot("m2", &["d"])).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.model, "m2");
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].chunk.text, "d");
    }

    #[tokio::test]
    async fn test_clear() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteIndexStore::new(tmp.path());
        store.replace(&snapshot("m1", &["a"])).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_load_never_mixes_concurrent_replace() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("index");
        let small = snapshot("m1", &["only"]);
        let many: Vec<String> = (0..50).map(|i| format!("text {}", i)).collect();
        let many_refs: Vec<&str> = many.iter().map(String::as_str).collect();
        let large = snapshot("m2", &many_refs);

        let writer = SqliteIndexStore::new(&dir);
        writer.replace(&small).await.unwrap();

        let swaps = tokio::spawn(async move {
            for i in 0..200 {
                let next = if i % 2 == 0 { &large } else { &small };
                writer.replace(next).await.unwrap();
            }
        });

        let reader = SqliteIndexStore::new(&dir);
        let mut loads = 0;
        while !swaps.is_finished() || loads == 0 {
            let loaded = reader.load().await.unwrap().unwrap();
            let expected = if loaded.model == "m1" { 1 } else { 50 };
            assert_eq!(loaded.entries.len(), expected, "model {} mixed with other chunks", loaded.model);
            assert_eq!(loaded.files[0].raw_text.matches("\n\n").count() + 1, expected);
            loads += 1;
        }
        swaps.await.unwrap();
    }
}
