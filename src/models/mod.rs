// src/models/mod.rs

//! Domain models for the catalog crawler.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod program;
mod requisite;
mod stats;

// Re-export all public types
pub use config::{CatalogConfig, Config, CrawlerConfig, EvaluationConfig, PathsConfig};
pub use program::{
    CatalogYear, Choice, CourseOption, Program, ProgramDetail, ProgramListing, RequiredUnits,
    RequirementRule, Section, YearSnapshot,
};
pub use requisite::{BoolOp, LeafMeta, RequisiteTree};
pub use stats::CrawlStats;
