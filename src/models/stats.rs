//! Run statistics written alongside crawl output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of one crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlStats {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Year ids whose snapshot was written
    pub years_written: Vec<String>,
    /// Listing pages that could not be fetched
    pub year_failures: usize,
    pub program_count: usize,
    /// Programs that ended without a parsed detail
    pub program_failures: usize,
    /// Whether the run was interrupted
    #[serde(default)]
    pub cancelled: bool,
}

impl CrawlStats {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time: start_time,
            years_written: Vec::new(),
            year_failures: 0,
            program_count: 0,
            program_failures: 0,
            cancelled: false,
        }
    }

    /// Share of programs that produced a detail record.
    pub fn success_rate(&self) -> f64 {
        if self.program_count == 0 {
            return 1.0;
        }
        (self.program_count - self.program_failures) as f64 / self.program_count as f64
    }
}
