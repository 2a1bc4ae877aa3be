// src/services/programs.rs

//! Program crawler service.
//!
//! Fetches one catalog year: the listing page first, then every program's
//! detail page concurrently.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use url::Url;

use crate::error::{FetchFailure, Result};
use crate::models::{CatalogYear, Config, Program, ProgramListing, YearSnapshot};
use crate::parser::CatalogParser;
use crate::services::fetcher::Fetcher;
use crate::utils::fill_template;

/// Why a program ended without a detail record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramFailure {
    #[error("primary fetch failed: {0}")]
    Primary(FetchFailure),

    #[error("fallback fetch failed: {0}")]
    Fallback(FetchFailure),

    #[error("no fallback URL provided")]
    NoFallback,
}

impl ProgramFailure {
    fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Primary(FetchFailure::Cancelled { .. })
                | Self::Fallback(FetchFailure::Cancelled { .. })
        )
    }
}

/// Result of fetching one program.
#[derive(Debug, Clone)]
pub struct ProgramOutcome {
    pub program: Program,
    pub failures: Vec<ProgramFailure>,
}

/// One fetched catalog year.
#[derive(Debug, Clone)]
pub struct YearReport {
    pub snapshot: YearSnapshot,
    /// `(program_code, failure)` pairs
    pub failures: Vec<(String, ProgramFailure)>,
    /// The batch was interrupted; the snapshot is incomplete.
    pub cancelled: bool,
}

impl YearReport {
    /// Programs that ended without a detail record.
    pub fn missing_details(&self) -> usize {
        self.snapshot
            .programs
            .iter()
            .filter(|p| p.detail.is_none())
            .count()
    }
}

/// Service for crawling catalog years.
pub struct ProgramCrawler {
    config: Arc<Config>,
    fetcher: Fetcher,
    parser: CatalogParser,
}

impl ProgramCrawler {
    pub fn new(config: Arc<Config>, fetcher: Fetcher) -> Result<Self> {
        Ok(Self {
            config,
            fetcher,
            parser: CatalogParser::new()?,
        })
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Listing page URL for a year.
    pub fn list_url(&self, year: CatalogYear) -> String {
        let catalog = &self.config.catalog;
        format!(
            "{}{}",
            catalog.base_url.trim_end_matches('/'),
            fill_template(&catalog.list_path, &[("year_id", &year.id_string())])
        )
    }

    /// Detail page URL for a program code.
    pub fn info_url(&self, year: CatalogYear, code: &str) -> String {
        let catalog = &self.config.catalog;
        format!(
            "{}{}",
            catalog.base_url.trim_end_matches('/'),
            fill_template(
                &catalog.info_path,
                &[("year_id", &year.id_string()), ("code", code)]
            )
        )
    }

    /// Fetch a whole year.
    ///
    /// A failed listing page is returned as an error. Failures of single
    /// programs are recorded on the program and in the report.
    pub async fn fetch_year(&self, year: CatalogYear) -> Result<YearReport> {
        let list_url = self.list_url(year);
        log::info!("Fetching list page {}", list_url);

        let html = self.fetcher.get_text(&list_url).await?;
        let base = Url::parse(&list_url)?;
        let listings = self.parser.parse_listing(&html, &base);
        log::info!("Found {} programs for {}", listings.len(), year.label());

        let concurrency = self.config.crawler.max_concurrent.max(1);
        let mut outcomes = stream::iter(listings.iter())
            .map(|listing| self.fetch_program(year, listing))
            .buffer_unordered(concurrency);

        let mut programs = Vec::with_capacity(listings.len());
        let mut failures = Vec::new();
        let mut cancelled = false;
        while let Some(outcome) = outcomes.next().await {
            cancelled |= outcome.failures.iter().any(ProgramFailure::is_cancelled);
            failures.extend(
                outcome
                    .failures
                    .into_iter()
                    .map(|f| (outcome.program.program_code.clone(), f)),
            );
            programs.push(outcome.program);
        }
        cancelled |= self.fetcher.is_cancelled();

        programs.sort_by(|a, b| {
            a.program_code
                .cmp(&b.program_code)
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(YearReport {
            snapshot: YearSnapshot {
                year_id: year.id_string(),
                year_label: year.label(),
                source_list_url: list_url,
                program_count: listings.len(),
                programs,
            },
            failures,
            cancelled,
        })
    }

    /// Fetch one program, falling back to the listing's own link.
    async fn fetch_program(&self, year: CatalogYear, listing: &ProgramListing) -> ProgramOutcome {
        let mut program = Program {
            name: listing.name.clone(),
            program_type: listing.program_type.clone(),
            department: listing.department.clone(),
            program_code: listing.program_code.clone(),
            year_id: Some(year.id_string()),
            year_label: Some(year.label()),
            ..Program::default()
        };
        let mut failures = Vec::new();

        let primary = self.info_url(year, &listing.program_code);
        let html = match self.fetcher.get_text(&primary).await {
            Ok(html) => Some(html),
            Err(failure) => {
                log::debug!("Primary URL failed for {}: {}", listing.name, failure);
                let cancelled = matches!(failure, FetchFailure::Cancelled { .. });
                failures.push(ProgramFailure::Primary(failure));
                if cancelled {
                    None
                } else {
                    self.fetch_fallback(listing, &mut failures).await
                }
            }
        };

        if let Some(html) = html {
            let detail = self.parser.parse_detail(&html);
            let dangling = detail.dangling_references();
            if !dangling.is_empty() {
                log::warn!(
                    "{} ({}) references unknown lists: {}",
                    listing.name,
                    listing.program_code,
                    dangling.join(", ")
                );
            }
            if detail.is_empty() {
                log::debug!("No requirement detail on page for {}", listing.name);
            } else {
                program.detail = Some(detail);
            }
        }

        program.errors = failures.iter().map(ToString::to_string).collect();
        ProgramOutcome { program, failures }
    }

    async fn fetch_fallback(
        &self,
        listing: &ProgramListing,
        failures: &mut Vec<ProgramFailure>,
    ) -> Option<String> {
        let Some(fallback) = listing.original_info_url.as_deref() else {
            failures.push(ProgramFailure::NoFallback);
            return None;
        };
        match self.fetcher.get_text(fallback).await {
            Ok(html) => {
                log::info!("OK fallback URL {} -> {}", fallback, listing.name);
                Some(html)
            }
            Err(failure) => {
                log::warn!("Fallback URL failed for {}: {}", listing.name, failure);
                failures.push(ProgramFailure::Fallback(failure));
                None
            }
        }
    }
}
