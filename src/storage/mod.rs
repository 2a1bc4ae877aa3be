//! Storage abstractions for crawl output.
//!
//! Every file is a complete snapshot written in one step; nothing is
//! appended or edited in place.
//!
//! ## Directory Structure
//!
//! ```text
//! output/
//! ├── programs_2018.json              # One file per catalog year
//! ├── programs_2019.json
//! ├── programs_2025_evaluated.json    # Programs rebuilt from evaluations
//! ├── stats.json                      # Last crawl run statistics
//! └── evaluations/
//!     └── raw_{code}.json             # Cached evaluation payloads
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::models::{CrawlStats, Program, YearSnapshot};

// Re-export for convenience
pub use local::LocalStorage;

/// Metadata about a storage write operation.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Where the document landed
    pub location: String,
    /// Number of records written
    pub count: usize,
    /// Timestamp of the write
    pub timestamp: DateTime<Utc>,
}

/// Programs rebuilt from evaluation payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluatedPrograms {
    pub programs: Vec<Program>,
}

/// Key of a catalog year snapshot.
pub fn year_key(start_year: i32) -> String {
    format!("programs_{start_year}.json")
}

/// Key of the evaluated program document.
pub fn evaluated_key(catalog_year: &str) -> String {
    format!("programs_{catalog_year}_evaluated.json")
}

/// Key of a cached evaluation payload.
pub fn payload_key(program_code: &str) -> String {
    let safe: String = program_code
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("evaluations/raw_{safe}.json")
}

/// Trait for output storage backends.
///
/// Documents are pruned of empty values before they are written.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Write one catalog year.
    async fn write_year(&self, snapshot: &YearSnapshot, start_year: i32) -> Result<WriteMetadata>;

    /// Load a previously written catalog year.
    async fn load_year(&self, start_year: i32) -> Result<Option<YearSnapshot>>;

    /// Write run statistics.
    async fn write_stats(&self, stats: &CrawlStats) -> Result<()>;

    /// Write programs rebuilt from evaluation payloads.
    async fn write_evaluated(
        &self,
        catalog_year: &str,
        programs: &[Program],
    ) -> Result<WriteMetadata>;

    /// Cached raw evaluation payload for a program, if any.
    async fn load_payload(&self, program_code: &str) -> Result<Option<Value>>;

    /// Cache a raw evaluation payload.
    async fn save_payload(&self, program_code: &str, payload: &Value) -> Result<()>;

    /// Write an arbitrary JSON document under `key`.
    async fn write_document(&self, key: &str, value: &Value) -> Result<WriteMetadata>;
}
