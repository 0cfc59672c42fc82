//! Local filesystem snapshot backend.
//!
//! The snapshot is a single pretty-printed JSON file. Writes go to a sibling
//! temporary file which is then renamed over the target, so an interrupted
//! save never leaves a truncated database behind.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{SnapshotBackend, SnapshotData};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    /// Create a LocalStorage for the database file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
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
impl SnapshotBackend for LocalStorage {
    async fn load(&self) -> Result<SnapshotData> {
        match self.read_bytes().await? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::snapshot(format!("could not parse {}: {e}", self.path.display()))
            }),
            None => {
                log::warn!(
                    "No snapshot database at {}, starting empty",
                    self.path.display()
                );
                Ok(SnapshotData::default())
            }
        }
    }

    async fn save(&self, data: &SnapshotData) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(data)?;
        self.write_bytes(&bytes).await
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
