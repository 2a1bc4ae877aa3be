//! Service layer for the catalog crawler.
//!
//! This module contains the network-facing logic:
//! - Bounded, retrying fetches (`Fetcher`)
//! - Catalog year crawling (`ProgramCrawler`)
//! - Program evaluation requests (`EvaluationClient`)

pub mod evaluation;
pub mod fetcher;
mod programs;

pub use evaluation::{EvaluationClient, EvaluationFailure, EvaluationOutcome};
pub use fetcher::{Fetcher, HttpTransport, RawResponse, RetryPolicy, Transport};
pub use programs::{ProgramCrawler, ProgramFailure, ProgramOutcome, YearReport};
