//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── programs_YYYY.json
//! ├── programs_YYYY_evaluated.json
//! ├── stats.json
//! └── evaluations/
//!     └── raw_{code}.json
//! ```
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! reader never sees a half-written year.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{CrawlStats, Program, YearSnapshot};
use crate::storage::{
    EvaluatedPrograms, SnapshotStorage, WriteMetadata, evaluated_key, payload_key, year_key,
};
use crate::utils::prune_empty;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data with empty values pruned.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let pruned = prune_empty(serde_json::to_value(value)?);
        let bytes = serde_json::to_vec_pretty(&pruned)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn metadata(&self, key: &str, count: usize) -> WriteMetadata {
        WriteMetadata {
            location: self.path(key).display().to_string(),
            count,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl SnapshotStorage for LocalStorage {
    async fn write_year(&self, snapshot: &YearSnapshot, start_year: i32) -> Result<WriteMetadata> {
        let key = year_key(start_year);
        self.write_json(&key, snapshot).await?;
        log::info!(
            "Wrote {} ({} programs)",
            key,
            snapshot.programs.len()
        );
        Ok(self.metadata(&key, snapshot.programs.len()))
    }

    async fn load_year(&self, start_year: i32) -> Result<Option<YearSnapshot>> {
        self.read_json(&year_key(start_year)).await
    }

    async fn write_stats(&self, stats: &CrawlStats) -> Result<()> {
        self.write_json("stats.json", stats).await
    }

    async fn write_evaluated(
        &self,
        catalog_year: &str,
        programs: &[Program],
    ) -> Result<WriteMetadata> {
        let key = evaluated_key(catalog_year);
        let document = EvaluatedPrograms {
            programs: programs.to_vec(),
        };
        self.write_json(&key, &document).await?;
        Ok(self.metadata(&key, programs.len()))
    }

    async fn load_payload(&self, program_code: &str) -> Result<Option<Value>> {
        let key = payload_key(program_code);
        match self.read_json::<Value>(&key).await {
            Ok(value) => Ok(value),
            Err(AppError::Json(e)) => {
                log::warn!("Ignoring unreadable cache {}: {}", key, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn save_payload(&self, program_code: &str, payload: &Value) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(payload)?;
        self.write_bytes(&payload_key(program_code), &bytes).await
    }

    async fn write_document(&self, key: &str, value: &Value) -> Result<WriteMetadata> {
        self.write_json(key, value).await?;
        let count = value.as_array().map_or(1, Vec::len);
        Ok(self.metadata(key, count))
    }
}
