//! On-disk snapshot images
//!
//! A snapshot is a single JSON document holding a format version and the
//! cache's entries in recency order. Writes go to a sibling temporary file
//! which is then renamed over the target, so a reader sees either the old
//! image or the new one, never a partial write.

use crate::error::{CacheError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Bumped whenever the image layout changes; older images are discarded
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedImage<V> {
    pub version: u32,
    pub written_at: DateTime<Utc>,
    /// Least recently accessed first
    pub entries: Vec<PersistedEntry<V>>,
}

impl<V> PersistedImage<V> {
    pub fn new(entries: Vec<PersistedEntry<V>>) -> Self {
        Self {
            version: FORMAT_VERSION,
            written_at: Utc::now(),
            entries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntry<V> {
    pub key: String,
    pub value: V,
    pub created_at: DateTime<Utc>,
    pub ttl_ms: u64,
}

#[derive(Deserialize)]
struct ImageHeader {
    version: u32,
}

/// Reads and atomically replaces a snapshot at a fixed path
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Load the image; `Ok(None)` when no snapshot has been written yet
    pub async fn load<V: DeserializeOwned>(&self) -> Result<Option<PersistedImage<V>>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let header: ImageHeader = serde_json::from_slice(&bytes)?;
        if header.version != FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                found: header.version,
                expected: FORMAT_VERSION,
            });
        }

        let image: PersistedImage<V> = serde_json::from_slice(&bytes)?;
        debug!(path = ?self.path, entries = image.entries.len(), "Loaded cache snapshot");
        Ok(Some(image))
    }

    /// Write the image to a temporary file, sync it, then rename over the target
    pub async fn store<V: Serialize>(&self, image: &PersistedImage<V>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec(image)?;
        let temp = self.temp_path();

        let mut file = fs::File::create(&temp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(path = ?self.path, entries = image.entries.len(), "Wrote cache snapshot");
        Ok(())
    }
}
