//! Application configuration structures.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Catalog site layout and year range
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Program-evaluation API settings
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Output locations
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.crawler.max_retries == 0 {
            return Err(AppError::validation("crawler.max_retries must be > 0"));
        }
        if self.crawler.backoff_base_ms > self.crawler.backoff_cap_ms {
            return Err(AppError::validation(
                "crawler.backoff_base_ms must not exceed crawler.backoff_cap_ms",
            ));
        }
        if url::Url::parse(&self.catalog.base_url).is_err() {
            return Err(AppError::validation(format!(
                "catalog.base_url is not a valid URL: {}",
                self.catalog.base_url
            )));
        }
        if self.catalog.stop_after_failures == 0 {
            return Err(AppError::validation(
                "catalog.stop_after_failures must be > 0",
            ));
        }
        if let Some(end) = self.catalog.end_year_id {
            if end < self.catalog.start_year_id {
                return Err(AppError::validation(
                    "catalog.end_year_id must be >= catalog.start_year_id",
                ));
            }
        }
        if self.evaluation.max_concurrent == 0 {
            return Err(AppError::validation(
                "evaluation.max_concurrent must be > 0",
            ));
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent requests (shared permit count)
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Attempts per request, including the first one
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles per attempt
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay
    #[serde(default = "defaults::backoff_cap")]
    pub backoff_cap_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            max_retries: defaults::max_retries(),
            backoff_base_ms: defaults::backoff_base(),
            backoff_cap_ms: defaults::backoff_cap(),
        }
    }
}

/// Catalog site layout and year range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Site root, e.g. `https://programs.butte.edu`
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Listing path; `{year_id}` is replaced by the two-digit year id
    #[serde(default = "defaults::list_path")]
    pub list_path: String,

    /// Detail path; `{year_id}` and `{code}` are replaced
    #[serde(default = "defaults::info_path")]
    pub info_path: String,

    /// First year id to crawl (8 => 2018-2019)
    #[serde(default = "defaults::start_year_id")]
    pub start_year_id: u32,

    /// Optional last year id; the crawl is otherwise unbounded
    #[serde(default)]
    pub end_year_id: Option<u32>,

    /// Calendar year that year id 0 starts in
    #[serde(default = "defaults::year_base")]
    pub year_base: i32,

    /// Stop after this many consecutive listing failures
    #[serde(default = "defaults::stop_after_failures")]
    pub stop_after_failures: u32,

    /// Pause between catalog years
    #[serde(default = "defaults::year_delay")]
    pub year_delay_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            list_path: defaults::list_path(),
            info_path: defaults::info_path(),
            start_year_id: defaults::start_year_id(),
            end_year_id: None,
            year_base: defaults::year_base(),
            stop_after_failures: defaults::stop_after_failures(),
            year_delay_ms: defaults::year_delay(),
        }
    }
}

/// Program-evaluation API settings.
///
/// Header and cookie values are opaque; they come from a logged-in browser
/// session and are passed through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Endpoint receiving the evaluation POST
    #[serde(default = "defaults::api_url")]
    pub api_url: String,

    /// Catalog year sent with every request
    #[serde(default = "defaults::catalog_year")]
    pub catalog_year: String,

    /// Student id used for what-if evaluations
    #[serde(default)]
    pub student_id: Option<String>,

    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Raw `Cookie` header value
    #[serde(default)]
    pub cookie: Option<String>,

    /// Maximum concurrent evaluation requests
    #[serde(default = "defaults::evaluation_concurrency")]
    pub max_concurrent: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            api_url: defaults::api_url(),
            catalog_year: defaults::catalog_year(),
            student_id: None,
            headers: BTreeMap::new(),
            cookie: None,
            max_concurrent: defaults::evaluation_concurrency(),
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root directory for all written files
    #[serde(default = "defaults::output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: defaults::output_dir(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; CatalogCrawler/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        64
    }
    pub fn max_retries() -> u32 {
        6
    }
    pub fn backoff_base() -> u64 {
        200
    }
    pub fn backoff_cap() -> u64 {
        6_000
    }

    // Catalog defaults
    pub fn base_url() -> String {
        "https://programs.butte.edu".into()
    }
    pub fn list_path() -> String {
        "/ProgramList/All/{year_id}/false".into()
    }
    pub fn info_path() -> String {
        "/ProgramInfo?yearId={year_id}&colleagueProgramCode={code}".into()
    }
    pub fn start_year_id() -> u32 {
        8
    }
    pub fn year_base() -> i32 {
        2010
    }
    pub fn stop_after_failures() -> u32 {
        2
    }
    pub fn year_delay() -> u64 {
        50
    }

    // Evaluation defaults
    pub fn api_url() -> String {
        "https://selfservice.butte.edu/student/Planning/Programs/ProgramEvaluation".into()
    }
    pub fn catalog_year() -> String {
        "2025".into()
    }
    pub fn evaluation_concurrency() -> usize {
        15
    }

    // Path defaults
    pub fn output_dir() -> PathBuf {
        PathBuf::from("output")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.crawler.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_year_range() {
        let mut config = Config::default();
        config.catalog.start_year_id = 10;
        config.catalog.end_year_id = Some(9);
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [crawler]
            max_concurrent = 8

            [catalog]
            start_year_id = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.crawler.max_concurrent, 8);
        assert_eq!(config.crawler.max_retries, 6);
        assert_eq!(config.catalog.start_year_id, 12);
        assert_eq!(config.catalog.stop_after_failures, 2);
        assert_eq!(config.paths.output_dir, PathBuf::from("output"));
    }
}
