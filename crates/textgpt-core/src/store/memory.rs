//! In-memory [`IndexStore`] for tests and ephemeral sessions.
//!
//! Holds a single snapshot behind `std::sync::RwLock`. Replacement swaps
//! the whole value, so it is trivially atomic.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{IndexSnapshot, IndexStore};

#[derive(Default)]
pub struct InMemoryStore {
    snapshot: RwLock<Option<IndexSnapshot>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `snapshot`, as if persisted earlier.
    pub fn with_snapshot(snapshot: IndexSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl IndexStore for InMemoryStore {
    async fn load(&self) -> Result<Option<IndexSnapshot>> {
        let guard = self
            .snapshot
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        Ok(guard.clone())
    }

    async fn replace(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        *guard = None;
        Ok(())
    }
}
