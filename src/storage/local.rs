//! Local filesystem state store.
//!
//! The whole state is one JSON document. A commit writes a sibling temp
//! file, flushes it to disk and renames it over the target, so a crash at
//! any point leaves either the old or the new document in place.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{STATE_VERSION, WatchState};
use crate::storage::StateStore;

/// JSON file state store.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Create a store backed by the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, sync, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        self.sync_dir().await
    }

    /// Persist the rename itself.
    #[cfg(unix)]
    async fn sync_dir(&self) -> Result<()> {
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        tokio::fs::File::open(&dir).await?.sync_all().await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_dir(&self) -> Result<()> {
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self) -> Result<WatchState> {
        let Some(bytes) = self.read_bytes().await? else {
            log::info!(
                "No state found at {}, starting with an empty seen set",
                self.path.display()
            );
            return Ok(WatchState::default());
        };

        let state: WatchState = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::state_corrupt(&self.path, e))?;

        if state.version > STATE_VERSION {
            return Err(AppError::state_corrupt(
                &self.path,
                format!(
                    "written by a newer version (v{}, supported v{})",
                    state.version, STATE_VERSION
                ),
            ));
        }

        log::debug!(
            "Loaded state from {}: {} seen, last run {:?}",
            self.path.display(),
            state.seen.len(),
            state.last_run_at
        );
        Ok(state)
    }

    async fn commit(&self, state: &WatchState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        self.write_bytes(&bytes).await?;
        log::debug!(
            "Committed state to {} ({} seen)",
            self.path.display(),
            state.seen.len()
        );
        Ok(())
    }
}
